use crate::{
    model::{Location, Moment, format_coordinate},
    provider::{AddressGrammar, ProviderId},
};

/// Request address for `location` at `moment`.
///
/// The credential is embedded as-is; an empty one yields an address the
/// provider will reject.
pub fn build_address(location: &Location, moment: Moment, provider: ProviderId, credential: &str) -> String {
    let lat = format_coordinate(location.lat());
    let lon = format_coordinate(location.lon());

    match provider.spec().grammar {
        AddressGrammar::PathEmbedded { base, units } => match moment.epoch_seconds() {
            None => format!("{base}{credential}/{lat},{lon}?units={units}"),
            Some(t) => format!("{base}{credential}/{lat},{lon},{t}?units={units}"),
        },
        AddressGrammar::QueryString { base, history, units } => match moment.epoch_seconds() {
            None => format!("{base}?lat={lat}&lon={lon}&appid={credential}&units={units}"),
            Some(t) => {
                format!("{base}{history}?lat={lat}&lon={lon}&dt={t}&appid={credential}&units={units}")
            }
        },
    }
}

/// `address` with the credential masked, for log lines and error messages.
pub fn redact(address: &str, credential: &str) -> String {
    if credential.is_empty() {
        address.to_string()
    } else {
        address.replace(credential, "***")
    }
}
