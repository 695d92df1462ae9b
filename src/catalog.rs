use serde::{Deserialize, Serialize};

/// A wash program: how long it runs and what it consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub name: String,
    /// Minutes.
    pub duration: u32,
    /// Liters.
    pub water_usage: f64,
    /// kWh.
    pub energy_usage: f64,
    /// kg CO₂.
    pub co2_impact: f64,
}

/// Read-only program reference data.
#[derive(Debug, Clone)]
pub struct ProgramCatalog {
    programs: Vec<Program>,
}

impl Default for ProgramCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProgramCatalog {
    pub fn new(programs: Vec<Program>) -> Self {
        Self { programs }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            program("quick", "Quick Wash", 30, 30.0, 0.6, 0.3),
            program("normal", "Normal Wash", 45, 45.0, 0.9, 0.4),
            program("heavy", "Heavy Duty", 60, 60.0, 1.2, 0.6),
        ])
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    /// Bookings store the program name, but requests may use either key.
    pub fn lookup(&self, key: &str) -> Option<&Program> {
        self.programs
            .iter()
            .find(|p| p.name == key)
            .or_else(|| self.programs.iter().find(|p| p.id == key))
    }
}

fn program(id: &str, name: &str, duration: u32, water: f64, energy: f64, co2: f64) -> Program {
    Program {
        id: id.into(),
        name: name.into(),
        duration,
        water_usage: water,
        energy_usage: energy,
        co2_impact: co2,
    }
}
