//! `calgo create`.

use calgo_core::{EventRequest, TimeResolver, parse_duration};
use calgo_providers::google::Authenticator;
use chrono::{Duration, Offset, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::CreateArgs;
use crate::config::Settings;
use crate::error::ClientResult;
use crate::output::{OutputMode, render_event};

/// Resolves the arguments into a validated event request.
pub fn build_request(
    args: &CreateArgs,
    settings: &Settings,
    resolver: &TimeResolver,
) -> ClientResult<EventRequest> {
    let timezone = settings.timezone.as_deref();
    let zone = resolver.zone(timezone)?;
    let start = resolver.resolve(&args.start, timezone)?;

    let duration = match args.duration.as_deref() {
        Some(text) => parse_duration(text)?,
        None => Duration::minutes(i64::from(settings.default_duration)),
    };

    let mut request = EventRequest::new(args.title.trim(), start, duration);
    if let Some(description) = args.description.as_deref().filter(|d| !d.trim().is_empty()) {
        request = request.with_description(description);
    }
    if let Some(location) = args.location.as_deref().filter(|l| !l.trim().is_empty()) {
        request = request.with_location(location);
    }
    if let Some(name) = zone.name() {
        request = request.with_time_zone(name);
    }

    request.validate()?;
    Ok(request)
}

/// Creates the event and prints the result.
pub async fn run(
    args: &CreateArgs,
    settings: &Settings,
    mode: OutputMode,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let request = build_request(args, settings, &TimeResolver::from_env())?;
    debug!(?request, calendar = %settings.calendar_id, "event request");

    let client = Authenticator::new(settings.google_config())
        .get_client(cancel)
        .await?;
    let event = client.create_event(&request).await?;

    let offset = request
        .start
        .map(|start| *start.offset())
        .unwrap_or_else(|| Utc.fix());
    println!("{}", render_event(&event, offset, mode)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, Overrides};
    use crate::error::ClientError;
    use chrono::TimeZone;

    fn args(start: &str, duration: Option<&str>) -> CreateArgs {
        CreateArgs {
            title: "  Planning  ".into(),
            start: start.into(),
            duration: duration.map(String::from),
            description: Some("Q3 roadmap".into()),
            location: Some(" ".into()),
            timezone: None,
            calendar: None,
        }
    }

    fn settings(timezone: Option<&str>) -> Settings {
        ClientConfig::default().resolve(&Overrides {
            timezone: timezone.map(String::from),
            ..Overrides::default()
        })
    }

    fn resolver() -> TimeResolver {
        TimeResolver::new().at(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap())
    }

    #[test]
    fn builds_request_in_named_zone() {
        let request = build_request(
            &args("tomorrow 14:00", Some("1h30m")),
            &settings(Some("Europe/Paris")),
            &resolver(),
        )
        .unwrap();

        assert_eq!(request.title, "Planning");
        assert_eq!(
            request.start.unwrap().to_rfc3339(),
            "2024-01-16T14:00:00+01:00"
        );
        assert_eq!(request.duration, Duration::minutes(90));
        assert_eq!(request.time_zone.as_deref(), Some("Europe/Paris"));
        assert_eq!(request.description.as_deref(), Some("Q3 roadmap"));
        assert_eq!(request.location, None);
    }

    #[test]
    fn default_duration_from_settings() {
        let mut settings = settings(Some("UTC"));
        settings.default_duration = 45;
        let request = build_request(&args("in 2 hours", None), &settings, &resolver()).unwrap();
        assert_eq!(request.duration, Duration::minutes(45));
        assert_eq!(
            request.end().unwrap().to_rfc3339(),
            "2024-01-15T14:45:00+00:00"
        );
    }

    #[test]
    fn rejects_bad_input() {
        let settings = settings(Some("UTC"));

        let err = build_request(&args("next blursday", None), &settings, &resolver()).unwrap_err();
        assert!(matches!(err, ClientError::Time(_)));

        let err = build_request(&args("14:00", Some("soon")), &settings, &resolver()).unwrap_err();
        assert!(matches!(err, ClientError::Duration(_)));

        let err = build_request(&args("14:00", Some("0")), &settings, &resolver()).unwrap_err();
        assert_eq!(err.to_string(), "invalid event: duration must be positive");

        let mut blank = args("14:00", None);
        blank.title = "   ".into();
        let err = build_request(&blank, &settings, &resolver()).unwrap_err();
        assert_eq!(err.to_string(), "invalid event: title is required");
    }

    #[test]
    fn unknown_zone_is_an_error() {
        let err = build_request(
            &args("14:00", None),
            &settings(Some("Mars/Olympus")),
            &resolver(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid timezone: Mars/Olympus");
    }

    #[tokio::test]
    async fn submits_resolved_event() {
        use calgo_providers::google::CalendarClient;
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(body_partial_json(json!({
                "summary": "Team Meeting",
                "start": {"dateTime": "2024-01-15T14:00:00+00:00", "timeZone": "UTC"},
                "end": {"dateTime": "2024-01-15T15:00:00+00:00", "timeZone": "UTC"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "evt1",
                "summary": "Team Meeting",
                "start": {"dateTime": "2024-01-15T14:00:00Z"},
                "end": {"dateTime": "2024-01-15T15:00:00Z"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut args = args("2024-01-15 14:00", Some("60"));
        args.title = "Team Meeting".into();
        let settings = settings(Some("UTC"));
        let request = build_request(&args, &settings, &resolver()).unwrap();

        let config = settings.google_config().with_api_base(server.uri());
        let event = CalendarClient::new("token", &config)
            .unwrap()
            .create_event(&request)
            .await
            .unwrap();
        assert_eq!(event.id, "evt1");
        assert_eq!(event.duration(), Duration::minutes(60));
    }
}
