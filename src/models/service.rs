use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::clock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i64,
    pub price: f64,
    pub category: Option<String>,
    pub active: bool,
    #[serde(with = "clock::timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "clock::timestamp")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i64,
    pub price: f64,
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub active: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl NewService {
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(&self.name, self.duration_minutes, self.price)
    }
}

impl Service {
    pub fn apply(&mut self, patch: ServicePatch) -> Result<(), String> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = empty_to_none(description);
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(category) = patch.category {
            self.category = empty_to_none(category);
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        validate_fields(&self.name, self.duration_minutes, self.price)
    }

    /// Case-insensitive match on name or category, used by the admin search box.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&q)
            || self
                .category
                .as_deref()
                .map(|c| c.to_lowercase().contains(&q))
                .unwrap_or(false)
    }
}

fn validate_fields(name: &str, duration_minutes: i64, price: f64) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Service name is required".to_string());
    }
    if duration_minutes <= 0 {
        return Err("Duration must be a positive number of minutes".to_string());
    }
    if !price.is_finite() || price < 0.0 {
        return Err("Price cannot be negative".to_string());
    }
    Ok(())
}

pub fn empty_to_none(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Service {
        let now = chrono::Utc::now().naive_utc();
        Service {
            id: "svc-1".to_string(),
            name: "Full Detail".to_string(),
            description: None,
            duration_minutes: 120,
            price: 150.0,
            category: Some("Exterior".to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patch_keeps_absent_fields() {
        let mut svc = service();
        svc.apply(ServicePatch {
            price: Some(99.5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(svc.price, 99.5);
        assert_eq!(svc.name, "Full Detail");
        assert_eq!(svc.duration_minutes, 120);
    }

    #[test]
    fn test_patch_rejects_blank_name() {
        let mut svc = service();
        let err = svc
            .apply(ServicePatch {
                name: Some("  ".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, "Service name is required");
    }

    #[test]
    fn test_new_service_rejects_zero_duration() {
        let input = NewService {
            name: "Wash".to_string(),
            description: None,
            duration_minutes: 0,
            price: 10.0,
            category: None,
            active: true,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_matches_name_or_category() {
        let svc = service();
        assert!(svc.matches("detail"));
        assert!(svc.matches("EXTERIOR"));
        assert!(svc.matches(""));
        assert!(!svc.matches("interior"));
    }
}
