use serde::Deserialize;

use crate::model::{Booking, Machine, Report, User};

use super::{StoreError, StoreResult};

const BUNDLED: &str = include_str!("../../data/seed.json");

/// Initial dataset used on first start and whenever a snapshot is corrupt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub machines: Vec<Machine>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub reports: Vec<Report>,
}

impl Seed {
    pub fn bundled() -> StoreResult<Self> {
        serde_json::from_str(BUNDLED).map_err(|e| StoreError::Seed(e.to_string()))
    }
}
