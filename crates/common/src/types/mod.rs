use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// Wire shape for a single default value lookup.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct DefaultValue {
    pub key: String,
    pub value: String,
}
