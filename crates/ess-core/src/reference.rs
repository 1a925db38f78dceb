//! Reference entities, referenced by files and supports but not owned by
//! them. Backends expose upserts so these can be seeded from the systems that
//! do own them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person with a registrant profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrant {
  pub registrant_id: Uuid,
  pub first_name:    String,
  pub last_name:     String,
  pub date_of_birth: Option<NaiveDate>,
  #[serde(default = "active_default")]
  pub active:        bool,
}

/// A staff user of the responder portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
  pub team_member_id: Uuid,
  pub display_name:   String,
  #[serde(default = "active_default")]
  pub active:         bool,
}

/// An ESS task that files are registered under, keyed by its task number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub task_number: String,
  pub community:   Option<String>,
  #[serde(default = "active_default")]
  pub active:      bool,
}

/// A supplier that can fulfil referrals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
  pub supplier_id: Uuid,
  pub name:        String,
  #[serde(default = "active_default")]
  pub active:      bool,
}

fn active_default() -> bool { true }
