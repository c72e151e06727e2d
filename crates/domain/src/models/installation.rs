//! Installation (work item) domain model.
//!
//! Installations are owned by the backend. The technician app only reads
//! snapshots and writes changes back through status, payment and completion
//! requests.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::{DomainError, InstallationId};

/// Lifecycle status of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallationStatus {
    /// Waiting for scheduling.
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "programada")]
    Scheduled,
    /// Technician is driving to the address.
    #[serde(rename = "en_camino")]
    OnTheWay,
    #[serde(rename = "en_progreso")]
    InProgress,
    #[serde(rename = "completada")]
    Completed,
    #[serde(rename = "cancelada")]
    Cancelled,
}

impl InstallationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallationStatus::Pending => "pendiente",
            InstallationStatus::Scheduled => "programada",
            InstallationStatus::OnTheWay => "en_camino",
            InstallationStatus::InProgress => "en_progreso",
            InstallationStatus::Completed => "completada",
            InstallationStatus::Cancelled => "cancelada",
        }
    }

    /// Completed and cancelled installations never need a visit.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallationStatus::Completed | InstallationStatus::Cancelled
        )
    }

    /// Statuses a technician may set from the field.
    pub fn is_technician_target(&self) -> bool {
        matches!(
            self,
            InstallationStatus::OnTheWay
                | InstallationStatus::InProgress
                | InstallationStatus::Completed
        )
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" => Ok(InstallationStatus::Pending),
            "programada" => Ok(InstallationStatus::Scheduled),
            "en_camino" => Ok(InstallationStatus::OnTheWay),
            "en_progreso" => Ok(InstallationStatus::InProgress),
            "completada" => Ok(InstallationStatus::Completed),
            "cancelada" => Ok(InstallationStatus::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "parcial")]
    Partial,
    #[serde(rename = "pagado")]
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "efectivo")]
    Cash,
    #[serde(rename = "transferencia")]
    Transfer,
    #[serde(rename = "tarjeta")]
    Card,
    #[serde(rename = "nequi")]
    Nequi,
    #[serde(rename = "daviplata")]
    Daviplata,
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "efectivo" => Ok(PaymentMethod::Cash),
            "transferencia" => Ok(PaymentMethod::Transfer),
            "tarjeta" => Ok(PaymentMethod::Card),
            "nequi" => Ok(PaymentMethod::Nequi),
            "daviplata" => Ok(PaymentMethod::Daviplata),
            other => Err(DomainError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

/// An installation as listed in the technician's daily agenda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: InstallationId,
    #[serde(default)]
    pub lead_name: String,
    #[serde(default)]
    pub lead_phone: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_model: String,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    /// Wall-clock time as sent by the backend (`HH:MM:SS`).
    #[serde(default)]
    pub scheduled_time: Option<String>,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address_notes: Option<String>,
    pub status: InstallationStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub customer_notes: Option<String>,
}

impl WorkItem {
    /// Parsed scheduled time; unparseable values count as unscheduled.
    pub fn scheduled_time_of_day(&self) -> Option<NaiveTime> {
        self.scheduled_time
            .as_deref()
            .and_then(shared::time::parse_schedule_time)
    }

    /// City with surrounding whitespace removed, `None` when blank.
    pub fn city_name(&self) -> Option<&str> {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Address line used as a map waypoint.
    pub fn navigation_label(&self) -> String {
        match self.city_name() {
            Some(city) => format!("{}, {}", self.address.trim(), city),
            None => self.address.trim().to_string(),
        }
    }

    pub fn balance_due(&self) -> f64 {
        (self.total_price - self.amount_paid).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateRequest {
    pub status: InstallationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateResponse {
    #[serde(default)]
    pub message: String,
    pub status: InstallationStatus,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct PaymentConfirmRequest {
    #[validate(custom(function = "shared::validation::validate_payment_amount"))]
    pub amount: f64,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmResponse {
    #[serde(default)]
    pub message: String,
    pub amount_paid: f64,
    pub total_price: f64,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompleteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_proof_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteResponse {
    #[serde(default)]
    pub message: String,
    pub id: InstallationId,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal agenda entry for tests.
    pub fn work_item(id: InstallationId, city: Option<&str>, time: Option<&str>) -> WorkItem {
        WorkItem {
            id,
            lead_name: format!("Cliente {}", id),
            lead_phone: "3001234567".to_string(),
            product_name: "Cerradura Digital".to_string(),
            product_model: "ZK-200".to_string(),
            product_image: None,
            scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            scheduled_time: time.map(str::to_string),
            address: format!("Calle {} # 10-20", id),
            city: city.map(str::to_string),
            address_notes: None,
            status: InstallationStatus::Scheduled,
            payment_status: PaymentStatus::Pending,
            total_price: 450_000.0,
            amount_paid: 0.0,
            customer_notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::work_item;
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&InstallationStatus::OnTheWay).unwrap();
        assert_eq!(json, "\"en_camino\"");
        let status: InstallationStatus = serde_json::from_str("\"en_progreso\"").unwrap();
        assert_eq!(status, InstallationStatus::InProgress);
        assert_eq!(InstallationStatus::Cancelled.to_string(), "cancelada");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "Completada".parse::<InstallationStatus>().unwrap(),
            InstallationStatus::Completed
        );
        assert!(matches!(
            "terminada".parse::<InstallationStatus>(),
            Err(DomainError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_terminal_and_technician_targets() {
        assert!(InstallationStatus::Completed.is_terminal());
        assert!(InstallationStatus::Cancelled.is_terminal());
        assert!(!InstallationStatus::InProgress.is_terminal());

        assert!(InstallationStatus::OnTheWay.is_technician_target());
        assert!(!InstallationStatus::Pending.is_technician_target());
        assert!(!InstallationStatus::Cancelled.is_technician_target());
    }

    #[test]
    fn test_work_item_deserializes_backend_payload() {
        let json = r#"{
            "id": 31,
            "lead_name": "Ana Torres",
            "lead_phone": "3105550000",
            "product_name": "Cerradura Biometrica",
            "product_model": "X7",
            "product_image": null,
            "scheduled_date": "2024-03-01",
            "scheduled_time": "09:30:00",
            "address": "Cra 15 # 93-47",
            "city": " Bogota ",
            "address_notes": "Apto 302",
            "status": "programada",
            "payment_status": "parcial",
            "total_price": 520000.0,
            "amount_paid": 200000.0,
            "customer_notes": null
        }"#;

        let item: WorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.status, InstallationStatus::Scheduled);
        assert_eq!(item.payment_status, PaymentStatus::Partial);
        assert_eq!(item.scheduled_time_of_day(), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(item.city_name(), Some("Bogota"));
        assert_eq!(item.navigation_label(), "Cra 15 # 93-47, Bogota");
        assert_eq!(item.balance_due(), 320_000.0);
    }

    #[test]
    fn test_navigation_label_without_city() {
        let item = work_item(4, Some("   "), None);
        assert_eq!(item.city_name(), None);
        assert_eq!(item.navigation_label(), "Calle 4 # 10-20");
    }

    #[test]
    fn test_payment_request_validation() {
        let ok = PaymentConfirmRequest {
            amount: 100_000.0,
            method: PaymentMethod::Nequi,
        };
        assert!(ok.validate().is_ok());

        let bad = PaymentConfirmRequest {
            amount: 0.0,
            method: PaymentMethod::Cash,
        };
        assert!(bad.validate().is_err());

        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["method"], "nequi");
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!("EFECTIVO".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }
}
