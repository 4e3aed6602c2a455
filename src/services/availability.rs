use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;

use crate::db::models::AppointmentDetails;
use crate::db::CapabilityRepository;

/// Capability facts backing the appointment visibility predicate, loaded in
/// bulk for a whole fetch result (one IN-query per entity kind) instead of
/// one lookup per appointment.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
    agenda_enabled: HashMap<String, bool>,
    owner_by_salon: HashMap<String, String>,
}

impl CapabilityIndex {
    /// Load the flags and owners referenced by `appointments`. A failed bulk
    /// lookup degrades to an empty map, which makes the predicate keep the
    /// affected rows rather than silently dropping them.
    pub async fn load(pool: &SqlitePool, appointments: &[AppointmentDetails]) -> Self {
        let professional_ids: Vec<String> = appointments
            .iter()
            .map(|a| a.professional_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let salon_ids: Vec<String> = appointments
            .iter()
            .filter_map(|a| a.salon_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let agenda_enabled = match CapabilityRepository::agenda_flags(pool, &professional_ids)
            .await
        {
            Ok(flags) => flags,
            Err(e) => {
                tracing::warn!("Bulk agenda-flag lookup failed, keeping all rows: {:?}", e);
                HashMap::new()
            }
        };

        let owner_by_salon = match CapabilityRepository::salon_owners(pool, &salon_ids).await {
            Ok(owners) => owners,
            Err(e) => {
                tracing::warn!("Bulk salon-owner lookup failed, keeping all rows: {:?}", e);
                HashMap::new()
            }
        };

        Self {
            agenda_enabled,
            owner_by_salon,
        }
    }

    #[cfg(test)]
    pub fn from_parts(
        agenda_enabled: HashMap<String, bool>,
        owner_by_salon: HashMap<String, String>,
    ) -> Self {
        Self {
            agenda_enabled,
            owner_by_salon,
        }
    }

    /// Whether an appointment is visible: the professional has an enabled
    /// personal agenda, or owns the salon, or the booking has no salon at all
    /// (independent professional). A professional missing from the index is
    /// treated as visible, so lookup failures never hide data.
    pub fn is_visible(&self, appointment: &AppointmentDetails) -> bool {
        let salon_id = match &appointment.salon_id {
            Some(id) => id,
            None => return true,
        };

        match self.agenda_enabled.get(&appointment.professional_id) {
            Some(true) => true,
            Some(false) => {
                self.owner_by_salon.get(salon_id) == Some(&appointment.professional_id)
            }
            // Unknown professional: conservatively keep the row.
            None => true,
        }
    }
}

/// Drop the appointments the viewer should not see.
pub fn apply_visibility_filter(
    appointments: Vec<AppointmentDetails>,
    index: &CapabilityIndex,
) -> Vec<AppointmentDetails> {
    appointments
        .into_iter()
        .filter(|a| index.is_visible(a))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use super::*;
    use crate::db::models::{AppointmentStatus, PaymentStatus};

    fn appointment(salon_id: Option<&str>, professional_id: &str) -> AppointmentDetails {
        let now = Utc::now().naive_utc();
        AppointmentDetails {
            id: "a1".to_string(),
            salon_id: salon_id.map(str::to_string),
            client_id: "c1".to_string(),
            professional_id: professional_id.to_string(),
            service_id: "s1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            duration_minutes: 30,
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Pending,
            price: 40.0,
            confirmation_code: "ZZZ999".to_string(),
            notes: None,
            cancellation_reason: None,
            cancelled_at: None,
            reminder_24h_sent_at: None,
            reminder_30m_sent_at: None,
            created_at: now,
            updated_at: now,
            salon_name: None,
            salon_address: None,
            salon_city: None,
            client_name: None,
            client_email: None,
            client_phone: None,
            client_photo_url: None,
            professional_name: None,
            professional_email: None,
            professional_phone: None,
            professional_photo_url: None,
            service_name: None,
            service_description: None,
            service_duration: None,
            service_price: None,
        }
    }

    #[test]
    fn disabled_agenda_in_a_salon_is_hidden() {
        let index = CapabilityIndex::from_parts(
            HashMap::from([("pro".to_string(), false)]),
            HashMap::from([("salon".to_string(), "someone-else".to_string())]),
        );
        assert!(!index.is_visible(&appointment(Some("salon"), "pro")));
    }

    #[test]
    fn disabled_agenda_without_salon_is_visible() {
        let index = CapabilityIndex::from_parts(
            HashMap::from([("pro".to_string(), false)]),
            HashMap::new(),
        );
        assert!(index.is_visible(&appointment(None, "pro")));
    }

    #[test]
    fn salon_owner_is_visible_despite_disabled_agenda() {
        let index = CapabilityIndex::from_parts(
            HashMap::from([("pro".to_string(), false)]),
            HashMap::from([("salon".to_string(), "pro".to_string())]),
        );
        assert!(index.is_visible(&appointment(Some("salon"), "pro")));
    }

    #[test]
    fn unknown_professional_is_kept() {
        let index = CapabilityIndex::default();
        assert!(index.is_visible(&appointment(Some("salon"), "pro")));
    }

    #[test]
    fn filter_drops_only_hidden_rows() {
        let index = CapabilityIndex::from_parts(
            HashMap::from([
                ("hidden".to_string(), false),
                ("visible".to_string(), true),
            ]),
            HashMap::new(),
        );
        let rows = vec![
            appointment(Some("salon"), "hidden"),
            appointment(Some("salon"), "visible"),
            appointment(None, "hidden"),
        ];
        let kept = apply_visibility_filter(rows, &index);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|a| index.is_visible(a)));
    }
}
