//! Source-shape classification and field extraction
//!
//! Decoded records arrive in one of four shapes: GuardDuty findings
//! (EventBridge envelope with `detail.type`), CloudTrail record batches
//! (`Records` array), generic AWS events (`source` key), and flat custom
//! events (`event_type` key). Anything else is malformed and the record
//! is skipped by the pipeline.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{EventKind, SecurityEvent};

/// Errors produced while classifying a decoded record
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Record matches no known event shape")]
    UnrecognizedShape,

    #[error("CloudTrail record batch is empty")]
    EmptyRecordBatch,
}

/// Classify a decoded payload and extract the envelope fields.
///
/// GuardDuty detection runs before the generic AWS-event check because
/// findings also carry a top-level `source` key.
pub fn extract_event(raw: Value) -> Result<SecurityEvent, ExtractError> {
    let obj = raw.as_object().ok_or(ExtractError::NotAnObject)?;

    if obj
        .get("detail")
        .and_then(|d| d.get("type"))
        .and_then(Value::as_str)
        .is_some()
    {
        return Ok(extract_guardduty(raw));
    }
    if obj.get("Records").map(|r| r.is_array()).unwrap_or(false) {
        return extract_cloudtrail(raw);
    }
    if obj.get("source").and_then(Value::as_str).is_some() {
        return Ok(extract_aws_event(raw));
    }
    if obj.get("event_type").and_then(Value::as_str).is_some() {
        return Ok(extract_custom(raw));
    }

    Err(ExtractError::UnrecognizedShape)
}

fn extract_guardduty(raw: Value) -> SecurityEvent {
    let mut event = SecurityEvent::new(EventKind::GuarddutyFinding, Value::Null);
    {
        let detail = &raw["detail"];
        let service = &detail["service"];

        event.finding_id = str_field(detail, "id");
        event.finding_type = str_field(detail, "type");
        event.severity = detail.get("severity").and_then(Value::as_f64);
        event.finding_confidence = detail.get("confidence").and_then(Value::as_f64);
        event.account = str_field(detail, "accountId").or_else(|| str_field(&raw, "account"));
        event.region = str_field(detail, "region").or_else(|| str_field(&raw, "region"));
        event.event_time = str_field(detail, "createdAt")
            .or_else(|| str_field(&raw, "time"))
            .and_then(|s| parse_event_time(&s));
        event.resource_type = detail
            .get("resource")
            .and_then(|r| r.get("resourceType"))
            .and_then(Value::as_str)
            .map(String::from);
        event.detail_type = str_field(&raw, "detail-type");
        event.source_ip = guardduty_source_ip(service);
        event.user_identity = guardduty_user_identity(service);
    }
    event.event_data = raw;
    event
}

/// Remote IP can live in several places depending on the action type.
fn guardduty_source_ip(service: &Value) -> Option<String> {
    if let Some(ip) = service
        .get("remoteIpDetails")
        .and_then(|d| d.get("ipAddressV4"))
        .and_then(Value::as_str)
    {
        return Some(ip.to_string());
    }

    let action = service.get("action")?;
    for action_key in ["networkConnectionAction", "awsApiCallAction"] {
        if let Some(ip) = action
            .get(action_key)
            .and_then(|a| a.get("remoteIpDetails"))
            .and_then(|d| d.get("ipAddressV4"))
            .and_then(Value::as_str)
        {
            return Some(ip.to_string());
        }
    }
    None
}

fn guardduty_user_identity(service: &Value) -> Option<Value> {
    service
        .get("action")
        .and_then(|a| a.get("awsApiCallAction"))
        .and_then(|a| a.get("userDetails"))
        .filter(|v| !v.is_null())
        .cloned()
}

fn extract_cloudtrail(raw: Value) -> Result<SecurityEvent, ExtractError> {
    let mut event = SecurityEvent::new(EventKind::Cloudtrail, Value::Null);
    {
        // First record of the batch carries the envelope fields
        let record = raw["Records"]
            .as_array()
            .and_then(|records| records.first())
            .ok_or(ExtractError::EmptyRecordBatch)?;

        event.event_name = str_field(record, "eventName");
        event.event_source = str_field(record, "eventSource");
        event.source_ip = str_field(record, "sourceIPAddress");
        event.user_agent = str_field(record, "userAgent");
        event.user_identity = record.get("userIdentity").filter(|v| !v.is_null()).cloned();
        event.account = record
            .get("userIdentity")
            .and_then(|u| u.get("accountId"))
            .and_then(Value::as_str)
            .map(String::from);
        event.event_time = str_field(record, "eventTime").and_then(|s| parse_event_time(&s));
        event.region = str_field(record, "awsRegion");
        event.error_code = str_field(record, "errorCode");
        event.error_message = str_field(record, "errorMessage");
        event.read_only = record.get("readOnly").and_then(Value::as_bool);
        event.resources = record
            .get("resources")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
    }
    event.event_data = raw;
    Ok(event)
}

fn extract_aws_event(raw: Value) -> SecurityEvent {
    let mut event = SecurityEvent::new(EventKind::AwsEvent, Value::Null);
    {
        event.event_source = str_field(&raw, "source");
        event.detail_type = str_field(&raw, "detail-type");
        event.account = str_field(&raw, "account");
        event.region = str_field(&raw, "region");
        event.event_time = str_field(&raw, "time").and_then(|s| parse_event_time(&s));
        event.resources = raw
            .get("resources")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        // Sign-in style events keep their interesting fields inside detail
        if let Some(detail) = raw.get("detail") {
            event.event_name = str_field(detail, "eventName");
            event.source_ip = str_field(detail, "sourceIPAddress");
            event.user_identity = detail.get("userIdentity").filter(|v| !v.is_null()).cloned();
            event.user_agent = str_field(detail, "userAgent");
            event.error_code = str_field(detail, "errorCode");
            event.error_message = str_field(detail, "errorMessage");
        }
    }
    event.event_data = raw;
    event
}

fn extract_custom(raw: Value) -> SecurityEvent {
    let type_str = raw["event_type"].as_str().unwrap_or_default().to_string();
    let kind = match type_str.as_str() {
        "cloudtrail" => EventKind::Cloudtrail,
        "guardduty-finding" => EventKind::GuarddutyFinding,
        _ => EventKind::Custom,
    };

    let mut event = SecurityEvent::new(kind, Value::Null);
    {
        event.event_name = Some(type_str);
        event.source_ip = str_field(&raw, "source_ip");
        event.severity = custom_severity(&raw);
        event.account = str_field(&raw, "customer_id");
        event.region = raw
            .get("metadata")
            .and_then(|m| m.get("region"))
            .and_then(Value::as_str)
            .map(String::from);
        event.user_identity = raw
            .get("user_id")
            .or_else(|| raw.get("user_identity"))
            .filter(|v| !v.is_null())
            .cloned();
        event.event_time = str_field(&raw, "timestamp").and_then(|s| parse_event_time(&s));
    }
    event.event_data = raw;
    event
}

/// Custom events carry either a numeric severity or a named level.
fn custom_severity(raw: &Value) -> Option<f64> {
    match raw.get("severity") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(level)) => match level.to_lowercase().as_str() {
            "low" => Some(2.0),
            "medium" => Some(5.0),
            "high" => Some(8.0),
            "critical" => Some(9.5),
            _ => None,
        },
        _ => None,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

/// Parse RFC 3339 timestamps, tolerating the offset-less form some
/// producers emit (treated as UTC).
pub fn parse_event_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guardduty_finding(severity: f64, ip: &str) -> Value {
        json!({
            "version": "0",
            "detail-type": "GuardDuty Finding",
            "source": "aws.guardduty",
            "account": "643275918916",
            "time": "2025-06-01T14:30:00Z",
            "region": "us-east-1",
            "detail": {
                "id": "finding-1234",
                "type": "UnauthorizedAPICall:EC2/MaliciousIPCaller.Custom",
                "severity": severity,
                "confidence": 9.2,
                "accountId": "643275918916",
                "region": "us-east-1",
                "createdAt": "2025-06-01T14:29:55Z",
                "resource": { "resourceType": "EC2Instance" },
                "service": {
                    "action": {
                        "actionType": "AWS_API_CALL",
                        "awsApiCallAction": {
                            "api": "RunInstances",
                            "remoteIpDetails": { "ipAddressV4": ip },
                            "userDetails": { "userName": "mallory" }
                        }
                    },
                    "count": 1
                }
            }
        })
    }

    #[test]
    fn test_guardduty_extraction() {
        let event = extract_event(guardduty_finding(8.5, "10.0.0.50")).unwrap();

        assert_eq!(event.event_type, EventKind::GuarddutyFinding);
        assert_eq!(
            event.finding_type.as_deref(),
            Some("UnauthorizedAPICall:EC2/MaliciousIPCaller.Custom")
        );
        assert_eq!(event.severity, Some(8.5));
        assert_eq!(event.finding_confidence, Some(9.2));
        assert_eq!(event.source_ip.as_deref(), Some("10.0.0.50"));
        assert_eq!(event.account.as_deref(), Some("643275918916"));
        assert_eq!(event.resource_type.as_deref(), Some("EC2Instance"));
        assert_eq!(event.user_identity.unwrap()["userName"], "mallory");
        assert!(event.event_time.is_some());
    }

    #[test]
    fn test_guardduty_wins_over_aws_event() {
        // Findings carry a `source` key too; detail.type must decide
        let event = extract_event(guardduty_finding(5.0, "10.0.0.50")).unwrap();
        assert_eq!(event.event_type, EventKind::GuarddutyFinding);
    }

    #[test]
    fn test_guardduty_network_connection_ip() {
        let raw = json!({
            "detail": {
                "type": "Recon:EC2/PortProbeUnprotectedPort",
                "severity": 2.0,
                "service": {
                    "action": {
                        "networkConnectionAction": {
                            "remoteIpDetails": { "ipAddressV4": "198.51.100.99" }
                        }
                    }
                }
            }
        });
        let event = extract_event(raw).unwrap();
        assert_eq!(event.source_ip.as_deref(), Some("198.51.100.99"));
        assert!(event.user_identity.is_none());
    }

    #[test]
    fn test_cloudtrail_extraction() {
        let raw = json!({
            "Records": [{
                "eventVersion": "1.05",
                "userIdentity": {
                    "type": "IAMUser",
                    "accountId": "123456789012",
                    "userName": "test-user"
                },
                "eventTime": "2025-06-01T03:15:00Z",
                "eventSource": "iam.amazonaws.com",
                "eventName": "CreateUser",
                "awsRegion": "us-east-1",
                "sourceIPAddress": "192.168.1.100",
                "userAgent": "aws-cli/2.0.0",
                "errorCode": "AccessDenied",
                "readOnly": false,
                "resources": [{ "type": "AWS::IAM::User" }]
            }]
        });

        let event = extract_event(raw).unwrap();
        assert_eq!(event.event_type, EventKind::Cloudtrail);
        assert_eq!(event.event_name.as_deref(), Some("CreateUser"));
        assert_eq!(event.source_ip.as_deref(), Some("192.168.1.100"));
        assert_eq!(event.account.as_deref(), Some("123456789012"));
        assert_eq!(event.error_code.as_deref(), Some("AccessDenied"));
        assert_eq!(event.read_only, Some(false));
        assert_eq!(event.resources.len(), 1);
    }

    #[test]
    fn test_cloudtrail_empty_batch() {
        let raw = json!({ "Records": [] });
        assert!(matches!(
            extract_event(raw),
            Err(ExtractError::EmptyRecordBatch)
        ));
    }

    #[test]
    fn test_aws_event_signin_detail() {
        let raw = json!({
            "detail-type": "AWS Console Sign In",
            "source": "aws.signin",
            "account": "643275918916",
            "time": "2025-06-01T14:00:00Z",
            "region": "us-east-1",
            "detail": {
                "eventName": "ConsoleLogin",
                "sourceIPAddress": "203.0.113.12",
                "userIdentity": { "userName": "normal-user" }
            }
        });

        let event = extract_event(raw).unwrap();
        assert_eq!(event.event_type, EventKind::AwsEvent);
        assert_eq!(event.event_source.as_deref(), Some("aws.signin"));
        assert_eq!(event.event_name.as_deref(), Some("ConsoleLogin"));
        assert_eq!(event.source_ip.as_deref(), Some("203.0.113.12"));
        assert_eq!(event.detail_type.as_deref(), Some("AWS Console Sign In"));
        assert!(event.severity.is_none());
    }

    #[test]
    fn test_custom_flat_event() {
        let raw = json!({
            "event_type": "guardduty-finding",
            "severity": 8.5,
            "source_ip": "192.168.1.100"
        });

        let event = extract_event(raw).unwrap();
        assert_eq!(event.event_type, EventKind::GuarddutyFinding);
        assert_eq!(event.severity, Some(8.5));
        assert_eq!(event.source_ip.as_deref(), Some("192.168.1.100"));
    }

    #[test]
    fn test_custom_named_severity_levels() {
        for (level, expected) in [
            ("low", 2.0),
            ("medium", 5.0),
            ("HIGH", 8.0),
            ("critical", 9.5),
        ] {
            let raw = json!({
                "event_type": "malware_detected",
                "severity": level,
                "source_ip": "172.16.0.10",
                "customer_id": "customer-001"
            });
            let event = extract_event(raw).unwrap();
            assert_eq!(event.severity, Some(expected), "level {}", level);
            assert_eq!(event.event_type, EventKind::Custom);
            assert_eq!(event.account.as_deref(), Some("customer-001"));
        }
    }

    #[test]
    fn test_unrecognized_shapes_rejected() {
        assert!(matches!(
            extract_event(json!("just a string")),
            Err(ExtractError::NotAnObject)
        ));
        assert!(matches!(
            extract_event(json!({ "foo": "bar" })),
            Err(ExtractError::UnrecognizedShape)
        ));
        assert!(matches!(
            extract_event(json!([1, 2, 3])),
            Err(ExtractError::NotAnObject)
        ));
    }

    #[test]
    fn test_event_time_parsing() {
        assert!(parse_event_time("2025-06-01T14:30:00Z").is_some());
        assert!(parse_event_time("2025-06-01T14:30:00+00:00").is_some());
        // offset-less producer timestamps are treated as UTC
        assert!(parse_event_time("2025-06-01T14:30:00.123456").is_some());
        assert!(parse_event_time("yesterday").is_none());
    }
}
