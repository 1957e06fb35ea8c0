//! Domain payload submitted for printing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A ticket to print. `ticket_type` selects the template by name; `fields`
/// are matched to regions by region name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Ticket {
    pub fn new(ticket_type: impl Into<String>) -> Self {
        Self {
            ticket_type: ticket_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn value(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_is_empty() {
        let ticket = Ticket::new("cashout").field("amount", "$10.00");
        assert_eq!(ticket.value("amount"), "$10.00");
        assert_eq!(ticket.value("validation"), "");
    }
}
