use super::handlers::{health, otp, volunteer};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Router that serves every documented endpoint and collects the `OpenAPI` document.
///
/// Routes registered outside of it (`OPTIONS /health`, `/uploads`, swagger UI)
/// are not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut otp_tag = Tag::new("otp");
    otp_tag.description = Some("Email ownership verification codes".to_string());

    let mut volunteer_tag = Tag::new("volunteer");
    volunteer_tag.description =
        Some("Registration, sessions and password reset".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and database status".to_string());

    // utoipa-axum 0.1 has no `get_openapi_mut`; `routes` never touches tags.
    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![otp_tag, volunteer_tag, health_tag]);

    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(otp::send_otp))
        .routes(routes!(otp::resend_otp))
        .routes(routes!(otp::otp_status))
        .routes(routes!(otp::verify_otp))
        .routes(routes!(volunteer::register::register))
        .routes(routes!(volunteer::session::login))
        .routes(routes!(volunteer::session::logout))
        .routes(routes!(volunteer::session::me))
        .routes(routes!(volunteer::password::forgot_password))
        .routes(routes!(volunteer::password::reset_password))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo joins authors with `;`; only the first one is published.
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

/// Split `Name <email>` into its parts.
fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        Some(value.trim()).filter(|value| !value.is_empty())
    }
    match author.split_once('<') {
        Some((name, rest)) => (non_empty(name), non_empty(rest.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, "volreg");
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Volreg"));
            assert_eq!(contact.email.as_deref(), Some("team@volreg.dev"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_documents_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/volunteer/otp/send",
            "/v1/volunteer/otp/resend",
            "/v1/volunteer/otp/status",
            "/v1/volunteer/otp/verify",
            "/v1/volunteer/register",
            "/v1/volunteer/login",
            "/v1/volunteer/logout",
            "/v1/volunteer/me",
            "/v1/volunteer/password/forgot",
            "/v1/volunteer/password/reset/{token}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }

        let tags = doc.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "otp"));
        assert!(tags.iter().any(|tag| tag.name == "volunteer"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team Volreg <team@volreg.dev>"),
            (Some("Team Volreg"), Some("team@volreg.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail.dev>"), (None, Some("only@mail.dev")));
        assert_eq!(parse_author("  "), (None, None));
    }
}
