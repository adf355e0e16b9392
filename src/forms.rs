use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use validator::{Validate, ValidationError};

static POSTAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}$").expect("postal code pattern is valid"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("year pattern is valid"));
static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+([.,]\d+)?$").expect("numeric pattern is valid"));

/// The three lead forms the website exposes. Used as rate-limit key and to
/// select the downstream webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    Contact,
    Quote,
    Emergency,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::Contact => "contact",
            FormKind::Quote => "quote",
            FormKind::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Waermepumpe,
    Heizung,
    Sanitaer,
    Klimaanlage,
    Solar,
    Sonstiges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmergencyType {
    HeizungAusfall,
    Rohrbruch,
    Gasgeruch,
    WarmwasserAusfall,
    Sonstiges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Einfamilienhaus,
    Mehrfamilienhaus,
    Wohnung,
    Gewerbe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactTime {
    Vormittags,
    Nachmittags,
    Abends,
    Jederzeit,
}

fn consent_given(value: &bool) -> Result<(), ValidationError> {
    if *value {
        Ok(())
    } else {
        let mut err = ValidationError::new("consent_required");
        err.message = Some("Bitte stimmen Sie der Datenschutzerklärung zu".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Name muss zwischen 2 und 100 Zeichen lang sein"
    ))]
    pub name: String,
    #[validate(email(message = "Bitte geben Sie eine gültige E-Mail-Adresse an"))]
    pub email: String,
    #[validate(length(min = 5, max = 50, message = "Telefonnummer ist ungültig"))]
    pub phone: Option<String>,
    #[validate(length(
        min = 3,
        max = 200,
        message = "Betreff muss zwischen 3 und 200 Zeichen lang sein"
    ))]
    pub subject: String,
    #[validate(length(
        min = 10,
        max = 2000,
        message = "Nachricht muss zwischen 10 und 2000 Zeichen lang sein"
    ))]
    pub message: String,
    #[serde(default)]
    #[validate(custom(function = consent_given))]
    pub gdpr_consent: bool,
    #[serde(default)]
    pub honeypot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSubmission {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Name muss zwischen 2 und 100 Zeichen lang sein"
    ))]
    pub name: String,
    #[validate(email(message = "Bitte geben Sie eine gültige E-Mail-Adresse an"))]
    pub email: String,
    #[validate(length(min = 5, max = 50, message = "Telefonnummer ist ungültig"))]
    pub phone: String,
    #[validate(length(max = 200, message = "Adresse darf höchstens 200 Zeichen lang sein"))]
    pub address: Option<String>,
    #[validate(regex(
        path = *POSTAL_CODE_RE,
        message = "Postleitzahl muss aus genau 5 Ziffern bestehen"
    ))]
    pub postal_code: String,
    #[validate(length(
        min = 2,
        max = 100,
        message = "Ort muss zwischen 2 und 100 Zeichen lang sein"
    ))]
    pub city: String,
    pub service_type: ServiceType,
    pub property_type: Option<PropertyType>,
    #[validate(regex(path = *YEAR_RE, message = "Baujahr muss vierstellig sein"))]
    pub construction_year: Option<String>,
    #[validate(regex(path = *NUMERIC_RE, message = "Heizfläche muss eine Zahl sein"))]
    pub heating_area: Option<String>,
    // Prefilled by the heat-pump cost calculator when the quote request comes
    // from a calculator result page. Free-form, forwarded as-is.
    pub pump_type: Option<String>,
    pub heating_surface: Option<String>,
    pub current_heating: Option<String>,
    pub insulation: Option<String>,
    pub building_year: Option<String>,
    pub residents: Option<String>,
    pub estimated_cost: Option<String>,
    #[validate(length(max = 2000, message = "Nachricht darf höchstens 2000 Zeichen lang sein"))]
    pub message: Option<String>,
    pub preferred_contact_time: Option<ContactTime>,
    #[serde(default)]
    #[validate(custom(function = consent_given))]
    pub gdpr_consent: bool,
    #[serde(default)]
    pub honeypot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmergencySubmission {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Name muss zwischen 2 und 100 Zeichen lang sein"
    ))]
    pub name: String,
    #[validate(email(message = "Bitte geben Sie eine gültige E-Mail-Adresse an"))]
    pub email: Option<String>,
    #[validate(length(min = 5, max = 50, message = "Telefonnummer ist ungültig"))]
    pub phone: String,
    #[validate(length(
        min = 5,
        max = 200,
        message = "Adresse muss zwischen 5 und 200 Zeichen lang sein"
    ))]
    pub address: String,
    #[validate(regex(
        path = *POSTAL_CODE_RE,
        message = "Postleitzahl muss aus genau 5 Ziffern bestehen"
    ))]
    pub postal_code: String,
    #[validate(length(
        min = 2,
        max = 100,
        message = "Ort muss zwischen 2 und 100 Zeichen lang sein"
    ))]
    pub city: String,
    pub emergency_type: EmergencyType,
    #[validate(length(
        min = 10,
        max = 500,
        message = "Beschreibung muss zwischen 10 und 500 Zeichen lang sein"
    ))]
    pub description: String,
    #[serde(default)]
    #[validate(custom(function = consent_given))]
    pub gdpr_consent: bool,
    #[serde(default)]
    pub honeypot: String,
}

/// Single-line address for the lead record, e.g. "Musterstr. 1, 86399 Bobingen".
pub fn full_address(street: Option<&str>, postal_code: &str, city: &str) -> String {
    match street.map(str::trim).filter(|s| !s.is_empty()) {
        Some(street) => format!("{}, {} {}", street, postal_code, city),
        None => format!("{} {}", postal_code, city),
    }
}

/// A validated form record that can be forwarded to the lead workflow.
pub trait LeadForm: DeserializeOwned + Validate {
    const KIND: FormKind;

    fn honeypot(&self) -> &str;

    /// JSON payload for the webhook: the validated field set without the
    /// honeypot, tagged with `source: "website"`.
    fn webhook_payload(&self) -> Value;
}

fn base_payload<T: Serialize>(form: &T) -> Map<String, Value> {
    let mut map = match serde_json::to_value(form) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    map.remove("honeypot");
    map.insert("source".to_string(), json!("website"));
    map
}

impl LeadForm for ContactSubmission {
    const KIND: FormKind = FormKind::Contact;

    fn honeypot(&self) -> &str {
        &self.honeypot
    }

    fn webhook_payload(&self) -> Value {
        Value::Object(base_payload(self))
    }
}

impl LeadForm for QuoteSubmission {
    const KIND: FormKind = FormKind::Quote;

    fn honeypot(&self) -> &str {
        &self.honeypot
    }

    fn webhook_payload(&self) -> Value {
        let mut map = base_payload(self);
        map.insert(
            "fullAddress".to_string(),
            json!(full_address(
                self.address.as_deref(),
                &self.postal_code,
                &self.city
            )),
        );
        Value::Object(map)
    }
}

impl LeadForm for EmergencySubmission {
    const KIND: FormKind = FormKind::Emergency;

    fn honeypot(&self) -> &str {
        &self.honeypot
    }

    fn webhook_payload(&self) -> Value {
        let mut map = base_payload(self);
        map.insert(
            "fullAddress".to_string(),
            json!(full_address(
                Some(&self.address),
                &self.postal_code,
                &self.city
            )),
        );
        Value::Object(map)
    }
}
