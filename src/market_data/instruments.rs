// Static instrument configuration. Ids are lower-cased on construction so
// every map lookup downstream compares like with like.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstrumentId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for InstrumentId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    pub id: InstrumentId,
    pub display_name: String, // e.g. "BTC/USDT"
    pub base_asset: String,
    pub quote_asset: String,
}

impl InstrumentDescriptor {
    pub fn new(id: &str, base_asset: &str, quote_asset: &str) -> Self {
        Self {
            id: InstrumentId::new(id),
            display_name: format!("{}/{}", base_asset, quote_asset),
            base_asset: base_asset.to_string(),
            quote_asset: quote_asset.to_string(),
        }
    }
}

/// Ordered, immutable set of instruments known at startup.
///
/// Order matters: it drives the subscription list, the default focus
/// (first entry) and the configuration-order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSet {
    descriptors: Vec<InstrumentDescriptor>,
}

impl InstrumentSet {
    /// Returns `None` for an empty list or when two descriptors share an id.
    pub fn new(descriptors: Vec<InstrumentDescriptor>) -> Option<Self> {
        if descriptors.is_empty() {
            return None;
        }
        for (i, d) in descriptors.iter().enumerate() {
            if descriptors[..i].iter().any(|prev| prev.id == d.id) {
                return None;
            }
        }
        Some(Self { descriptors })
    }

    pub fn first(&self) -> &InstrumentDescriptor {
        // non-empty by construction
        &self.descriptors[0]
    }

    /// Case-insensitive lookup.
    pub fn get(&self, id: &str) -> Option<&InstrumentDescriptor> {
        let id = InstrumentId::new(id);
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.descriptors.iter().any(|d| &d.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &InstrumentId> {
        self.descriptors.iter().map(|d| &d.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for InstrumentSet {
    fn default() -> Self {
        Self { descriptors: default_pairs() }
    }
}

/// The USDT pairs tracked out of the box.
pub fn default_pairs() -> Vec<InstrumentDescriptor> {
    [
        ("btcusdt", "BTC"),
        ("ethusdt", "ETH"),
        ("bnbusdt", "BNB"),
        ("solusdt", "SOL"),
        ("xrpusdt", "XRP"),
        ("adausdt", "ADA"),
        ("dogeusdt", "DOGE"),
        ("avaxusdt", "AVAX"),
    ]
    .into_iter()
    .map(|(id, base)| InstrumentDescriptor::new(id, base, "USDT"))
    .collect()
}
