//! User-facing German strings. Every failure message gives the caller a way
//! to continue (a retry time or the direct phone number) so a lead is never
//! a dead end.

use crate::forms::FormKind;

pub const DIRECT_PHONE: &str = "+49 8234 9665900";

pub const MALFORMED_REQUEST: &str = "Ungültige Anfrage";
pub const INVALID_FORM_DATA: &str = "Ungültige Formulardaten";
// Deliberately generic so automated abusers learn nothing about the honeypot.
pub const SPAM_REJECTED: &str = "Invalid submission";

pub fn confirmation(kind: FormKind) -> String {
    match kind {
        FormKind::Contact => {
            "Vielen Dank für Ihre Nachricht! Wir melden uns so schnell wie möglich bei Ihnen."
                .to_string()
        }
        FormKind::Quote => {
            "Vielen Dank für Ihre Anfrage! Sie erhalten innerhalb von 24 Stunden eine Rückmeldung von uns."
                .to_string()
        }
        FormKind::Emergency => format!(
            "Ihre Notfallanfrage ist bei uns eingegangen. Wir rufen Sie umgehend zurück. Bei akuter Gefahr erreichen Sie uns direkt unter {}.",
            DIRECT_PHONE
        ),
    }
}

pub fn rate_limited(kind: FormKind, reset_in: i64) -> String {
    match kind {
        FormKind::Emergency => format!(
            "Zu viele Anfragen. Bitte rufen Sie uns direkt an: {}",
            DIRECT_PHONE
        ),
        _ => {
            let minutes = (reset_in + 59) / 60;
            format!(
                "Zu viele Anfragen. Bitte versuchen Sie es in {} Minute{} erneut.",
                minutes,
                if minutes == 1 { "" } else { "n" }
            )
        }
    }
}

pub fn delivery_failed() -> String {
    format!(
        "Ihre Anfrage konnte leider nicht übermittelt werden. Bitte versuchen Sie es erneut oder rufen Sie uns direkt an: {}",
        DIRECT_PHONE
    )
}
