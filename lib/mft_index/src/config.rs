use std::collections::BTreeSet;

use crate::attribute::AttributeType;

pub const DEFAULT_CACHE_CAPACITY : usize = 1024;

/// Which attribute types get loaded into entries. Everything is loaded by default.
///
/// Disabling DATA suppresses datastream assembly entirely. Types outside the known
/// set are always loaded as opaque attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeLoadFlags {
    disabled : BTreeSet<AttributeType>,
}

impl AttributeLoadFlags {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn disable(&mut self, attribute_type : AttributeType) -> &mut Self {
        if !matches!(attribute_type, AttributeType::Unknown(_)) {
            self.disabled.insert(attribute_type);
        }
        self
    }

    pub fn enable(&mut self, attribute_type : AttributeType) -> &mut Self {
        self.disabled.remove(&attribute_type);
        self
    }

    pub fn is_enabled(&self, attribute_type : AttributeType) -> bool {
        !self.disabled.contains(&attribute_type)
    }
}

#[derive(Debug, Clone)]
pub struct MftConfig {
    pub load_flags : AttributeLoadFlags,
    pub apply_fixup_array : bool,
    /// When set, records without a FILE/BAAD signature are logged and parsed anyway
    pub ignore_signature_check : bool,
    /// 0 detects the entry size from the image
    pub entry_size_override : u64,
    /// 0 disables the entry cache
    pub cache_capacity : usize,
}

impl Default for MftConfig {
    fn default() -> Self {
        MftConfig {
            load_flags: AttributeLoadFlags::all(),
            apply_fixup_array: true,
            ignore_signature_check: true,
            entry_size_override: 0,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl MftConfig {
    pub fn with_load_flags(mut self, load_flags : AttributeLoadFlags) -> Self {
        self.load_flags = load_flags;
        self
    }

    pub fn without_attribute(mut self, attribute_type : AttributeType) -> Self {
        self.load_flags.disable(attribute_type);
        self
    }

    pub fn with_fixup(mut self, apply_fixup_array : bool) -> Self {
        self.apply_fixup_array = apply_fixup_array;
        self
    }

    pub fn with_signature_check(mut self, strict : bool) -> Self {
        self.ignore_signature_check = !strict;
        self
    }

    pub fn with_entry_size(mut self, entry_size : u64) -> Self {
        self.entry_size_override = entry_size;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity : usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }
}
