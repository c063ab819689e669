use log::warn;

use crate::attribute::{Attribute, AttributeForm};
use crate::data_run::DataRun;
use crate::error::{MftError, Result};
use crate::mft_types::AttributeContent;

/// The runs carried by one non-resident DATA attribute record, starting at `start_vcn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFragment {
    pub start_vcn : u64,
    pub runs : Vec<DataRun>,
}

/// A named data stream assembled from one or more DATA attributes. The empty name is the
/// default stream; anything else is an alternate data stream.
///
/// A stream is either resident (inline content) or non-resident (run fragments), never both.
/// Non-resident fragments can arrive in any order, but runs are always handed out ordered by VCN.
#[derive(Debug, Clone)]
pub struct Datastream {
    name : String,
    is_resident : Option<bool>,
    size : Option<u64>,
    alloc_size : Option<u64>,
    cluster_count : u64,
    content : Option<Vec<u8>>,
    fragments : Vec<RunFragment>,
    sorted : bool,
}

impl Datastream {
    pub fn new(name : &str) -> Self {
        Datastream {
            name: name.to_owned(),
            is_resident: None,
            size: None,
            alloc_size: None,
            cluster_count: 0,
            content: None,
            fragments: vec!(),
            sorted: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_resident(&self) -> bool {
        self.is_resident == Some(true)
    }

    /// Logical size in bytes. For non-resident streams this is only known once the VCN 0 fragment is in.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn alloc_size(&self) -> Option<u64> {
        self.alloc_size
    }

    /// One past the highest VCN covered by any fragment seen so far
    pub fn cluster_count(&self) -> u64 {
        self.cluster_count
    }

    pub fn add_fragment(&mut self, attribute : &Attribute) -> Result<()> {
        if attribute.name() != self.name {
            return Err(MftError::DataStream(format!("Fragment named '{}' added to stream '{}'", attribute.name(), self.name)));
        }

        match &attribute.header.form {
            AttributeForm::NonResident(header) => {
                if self.is_resident == Some(true) {
                    return Err(MftError::DataStream(format!("Non-resident fragment added to resident stream '{}'", self.name)));
                }

                self.is_resident = Some(false);
                self.fragments.push(RunFragment { start_vcn: header.start_vcn, runs: header.data_runs.clone() });
                self.sorted = false;
                self.cluster_count = self.cluster_count.max(header.end_vcn());

                // Only the first fragment carries the stream's sizes
                if header.start_vcn == 0 && self.size.is_none() {
                    self.size = Some(header.data_size);
                    self.alloc_size = Some(header.alloc_size);
                }
            },
            AttributeForm::Resident(_) => {
                if self.is_resident == Some(false) {
                    return Err(MftError::DataStream(format!("Resident fragment added to non-resident stream '{}'", self.name)));
                }

                let content = match &attribute.content {
                    Some(AttributeContent::Raw(bytes)) => bytes.clone(),
                    _ => return Err(MftError::DataStream(format!("Resident fragment for stream '{}' carries no content", self.name)))
                };

                self.is_resident = Some(true);
                self.size = Some(content.len() as u64);
                self.alloc_size = Some(content.len() as u64);
                self.content = Some(content);
            }
        }

        Ok(())
    }

    /// Folds a same-named stream from a child record into this one
    pub fn merge_from(&mut self, other : Datastream) -> Result<()> {
        if other.name != self.name {
            return Err(MftError::DataStream(format!("Cannot merge stream '{}' into stream '{}'", other.name, self.name)));
        }

        match (self.is_resident, other.is_resident) {
            (Some(mine), Some(theirs)) if mine != theirs => {
                return Err(MftError::DataStream(format!("Stream '{}' is resident in one record and non-resident in another", self.name)));
            },
            _ => {}
        }

        self.is_resident = self.is_resident.or(other.is_resident);

        if !other.fragments.is_empty() {
            self.fragments.extend(other.fragments);
            self.sorted = false;
        }

        if self.content.is_none() {
            self.content = other.content;
        }

        // At most one side can hold the VCN 0 fragment
        if self.size.is_none() {
            self.size = other.size;
            self.alloc_size = other.alloc_size;
        }

        self.cluster_count = self.cluster_count.max(other.cluster_count);

        Ok(())
    }

    /// Puts fragments in VCN order. Equal VCNs keep the order they were added in.
    pub fn sort_fragments(&mut self) {
        if !self.sorted {
            self.fragments.sort_by_key(|fragment| fragment.start_vcn);
            self.sorted = true;

            let duplicates = self.duplicate_vcns();
            if !duplicates.is_empty() {
                warn!("Stream '{}' has several fragments starting at VCN(s) {:?}; all of them are kept", self.name, duplicates);
            }
        }
    }

    /// Fragments in VCN order
    pub fn fragments(&self) -> Vec<&RunFragment> {
        let mut fragments : Vec<&RunFragment> = self.fragments.iter().collect();
        if !self.sorted {
            fragments.sort_by_key(|fragment| fragment.start_vcn);
        }
        fragments
    }

    /// All runs of the stream, ordered by the starting VCN of the fragment they came from
    pub fn get_dataruns(&self) -> Result<Vec<DataRun>> {
        if self.is_resident() {
            return Err(MftError::DataStream(format!("Data runs requested for resident stream '{}'", self.name)));
        }

        Ok(self.fragments().into_iter().flat_map(|fragment| fragment.runs.iter().copied()).collect())
    }

    pub fn get_content(&self) -> Result<&[u8]> {
        match (&self.content, self.is_resident) {
            (Some(content), Some(true)) => Ok(content),
            (_, Some(false)) => Err(MftError::DataStream(format!("Content requested for non-resident stream '{}'", self.name))),
            _ => Err(MftError::DataStream(format!("Content requested for stream '{}' before any resident fragment was added", self.name)))
        }
    }

    /// VCNs at which more than one fragment starts
    pub fn duplicate_vcns(&self) -> Vec<u64> {
        let mut vcns : Vec<u64> = self.fragments.iter().map(|fragment| fragment.start_vcn).collect();
        vcns.sort_unstable();

        let mut duplicates : Vec<u64> = vcns.windows(2).filter(|pair| pair[0] == pair[1]).map(|pair| pair[0]).collect();
        duplicates.dedup();
        duplicates
    }
}
