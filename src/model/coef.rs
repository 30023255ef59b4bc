//! Auxiliary coefficients persisted beside the fitted pipeline.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Store key mirroring the channel-selection index set.
pub const CHANNEL_INDEX_KEY: &str = "ind_ch_scores";

/// Named integer arrays, saved and restored as one unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoefficientStore(BTreeMap<String, Vec<usize>>);

impl CoefficientStore {
    pub fn get(&self, key: &str) -> Option<&[usize]> {
        self.0.get(key).map(Vec::as_slice)
    }
    pub fn insert(&mut self, key: impl Into<String>, value: Vec<usize>) {
        self.0.insert(key.into(), value);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Channel selection plus the store it is mirrored into.
///
/// The selection is only ever written through [`Coefficients::set_ch_ind`], so
/// the field and the `ind_ch_scores` entry hold the same sorted indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Coefficients {
    store: CoefficientStore,
    ch_ind: Option<Vec<usize>>,
}

impl Coefficients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a loaded store; a stored selection is re-sorted on the way in.
    pub fn from_store(store: CoefficientStore) -> Self {
        let selection = store.get(CHANNEL_INDEX_KEY).map(<[usize]>::to_vec);
        let mut coefs = Self {
            store,
            ch_ind: None,
        };
        if let Some(indices) = selection {
            coefs.set_ch_ind(indices);
        }
        coefs
    }

    pub fn ch_ind(&self) -> Option<&[usize]> {
        self.ch_ind.as_deref()
    }

    pub fn set_ch_ind(&mut self, mut indices: Vec<usize>) {
        indices.sort_unstable();
        self.store.insert(CHANNEL_INDEX_KEY, indices.clone());
        self.ch_ind = Some(indices);
        debug_assert!(self.check_consistency());
    }

    /// True when the field and the store mirror agree.
    pub fn check_consistency(&self) -> bool {
        self.ch_ind.as_deref() == self.store.get(CHANNEL_INDEX_KEY)
    }

    pub fn store(&self) -> &CoefficientStore {
        &self.store
    }
}
