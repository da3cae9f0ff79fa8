//! Report model

use serde::{Deserialize, Deserializer, Serialize};

/// `estado` value written by the resolve operation
pub const RESOLVED_STATUS: &str = "Resuelto";

/// A citizen-submitted incident report, as stored in `REPORTES`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub tipo: String,
    pub ubicacion: String,
    pub descripcion: Option<String>,
    pub urgencia: String,
    pub nombre: Option<String>,
    pub correo: Option<String>,
    /// `None` while open, `Some("Resuelto")` once resolved
    pub estado: Option<String>,
}

/// Submission payload. Nothing is validated here; missing fields reach the
/// store as NULL and the schema decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReport {
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub ubicacion: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub urgencia: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub correo: Option<String>,
}

/// Row selector exactly as the client sent it.
///
/// Accepts a JSON number, a string (form bodies) or nothing at all. The
/// value is bound as-is; the store performs any coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportId(pub Option<String>);

impl ReportId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<i64> for ReportId {
    fn from(id: i64) -> Self {
        Self(Some(id.to_string()))
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "<none>"),
        }
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(Self(raw.map(|r| match r {
            Raw::Int(n) => n.to_string(),
            Raw::Text(s) => s,
        })))
    }
}

/// Body of the edit operation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditReportInput {
    #[serde(default)]
    pub id: ReportId,
    #[serde(default)]
    pub descripcion: Option<String>,
}

/// Body of the delete and resolve operations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportIdInput {
    #[serde(default)]
    pub id: ReportId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(estado: Option<&str>) -> Report {
        Report {
            id: 1,
            tipo: "bache".to_string(),
            ubicacion: "Calle 5".to_string(),
            descripcion: None,
            urgencia: "alta".to_string(),
            nombre: None,
            correo: None,
            estado: estado.map(String::from),
        }
    }

    #[test]
    fn test_report_serializes_store_columns() {
        let open = serde_json::to_value(report(None)).unwrap();
        assert_eq!(open["id"], 1);
        assert_eq!(open["tipo"], "bache");
        assert!(open["estado"].is_null());
        assert!(open["descripcion"].is_null());

        let resolved = serde_json::to_value(report(Some(RESOLVED_STATUS))).unwrap();
        assert_eq!(resolved["estado"], "Resuelto");
    }

    #[test]
    fn test_report_id_accepts_number_and_string() {
        let input: ReportIdInput = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(input.id, ReportId(Some("7".to_string())));

        let input: ReportIdInput = serde_json::from_str(r#"{"id": "7"}"#).unwrap();
        assert_eq!(input.id, ReportId(Some("7".to_string())));

        let input: ReportIdInput = serde_json::from_str(r#"{"id": null}"#).unwrap();
        assert_eq!(input.id, ReportId(None));

        let input: ReportIdInput = serde_json::from_str("{}").unwrap();
        assert_eq!(input.id, ReportId(None));
    }

    #[test]
    fn test_new_report_serializes_null_for_missing() {
        let input: NewReport = serde_json::from_str(r#"{"tipo": "bache"}"#).unwrap();
        assert_eq!(input.tipo.as_deref(), Some("bache"));
        assert!(input.urgencia.is_none());
    }
}
