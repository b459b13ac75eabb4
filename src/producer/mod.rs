//! Test event producer
//!
//! Generates sample security events for exercising the pipeline:
//! three canonical fixtures covering each source shape, plus
//! randomized custom events. Events can be written to a JSONL file
//! (for the file tailer) or sent as UDP datagrams.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::io::Write;
use std::net::UdpSocket;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

const CUSTOM_EVENT_TYPES: &[&str] = &[
    "failed_login",
    "successful_login",
    "malware_detected",
    "network_anomaly",
    "privilege_escalation",
    "data_access",
    "system_change",
    "policy_violation",
];

const SEVERITY_LEVELS: &[&str] = &["low", "medium", "high", "critical"];

const SOURCE_IPS: &[&str] = &[
    "192.168.1.100",
    "192.168.1.101",
    "10.0.0.50",
    "10.0.0.51",
    "172.16.0.10",
    "203.0.113.12",
];

const CUSTOMER_IDS: &[&str] = &[
    "customer-001",
    "customer-002",
    "customer-003",
    "customer-004",
    "customer-005",
];

/// Errors produced while emitting test events
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Generates sample security events
pub struct EventProducer {
    rng: StdRng,
    /// Seeded producers stamp events from a fixed base time so the
    /// whole event, timestamp included, reproduces run to run.
    fixed_time: Option<DateTime<Utc>>,
    ticks: i64,
}

impl EventProducer {
    pub fn new() -> Self {
        EventProducer {
            rng: StdRng::from_entropy(),
            fixed_time: None,
            ticks: 0,
        }
    }

    /// Seeded producer for reproducible output
    pub fn with_seed(seed: u64) -> Self {
        EventProducer {
            rng: StdRng::seed_from_u64(seed),
            fixed_time: Some(
                Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            ),
            ticks: 0,
        }
    }

    fn next_timestamp(&mut self) -> String {
        match self.fixed_time {
            Some(base) => {
                let ts = base + Duration::seconds(self.ticks);
                self.ticks += 1;
                ts.to_rfc3339()
            }
            None => Utc::now().to_rfc3339(),
        }
    }

    /// Three fixed events covering each source shape: a CloudTrail
    /// batch from a blocklisted address, a high-severity GuardDuty
    /// finding, and a benign console sign-in.
    pub fn canonical_events() -> Vec<Value> {
        let now = Utc::now().to_rfc3339();

        let cloudtrail = json!({
            "Records": [{
                "eventVersion": "1.05",
                "userIdentity": {
                    "type": "IAMUser",
                    "principalId": "AIDACKCEVSQ6C2EXAMPLE",
                    "arn": "arn:aws:iam::123456789012:user/test-user",
                    "accountId": "123456789012",
                    "userName": "test-user"
                },
                "eventTime": now,
                "eventSource": "iam.amazonaws.com",
                "eventName": "CreateUser",
                "awsRegion": "us-east-1",
                "sourceIPAddress": "192.168.1.100",
                "userAgent": "aws-cli/2.0.0",
                "requestParameters": { "userName": "suspicious-user" },
                "requestID": Uuid::new_v4().to_string(),
                "eventID": Uuid::new_v4().to_string(),
                "eventType": "AwsApiCall",
                "readOnly": false,
                "resources": [{
                    "ARN": "arn:aws:iam::123456789012:user/suspicious-user",
                    "accountId": "123456789012",
                    "type": "AWS::IAM::User"
                }]
            }]
        });

        let guardduty = json!({
            "version": "0",
            "id": Uuid::new_v4().to_string(),
            "detail-type": "GuardDuty Finding",
            "source": "aws.guardduty",
            "account": "643275918916",
            "time": now,
            "region": "us-east-1",
            "detail": {
                "schemaVersion": "2.0",
                "accountId": "643275918916",
                "region": "us-east-1",
                "id": Uuid::new_v4().to_string(),
                "type": "UnauthorizedAPICall:EC2/MaliciousIPCaller.Custom",
                "resource": {
                    "resourceType": "EC2Instance",
                    "instanceDetails": {
                        "instanceId": "i-1234567890abcdef0",
                        "instanceType": "t2.micro"
                    }
                },
                "service": {
                    "action": {
                        "actionType": "AWS_API_CALL",
                        "awsApiCallAction": {
                            "api": "RunInstances",
                            "serviceName": "ec2.amazonaws.com",
                            "remoteIpDetails": {
                                "ipAddressV4": "10.0.0.50",
                                "organization": {
                                    "asn": "16509",
                                    "asnOrg": "AMAZON-02",
                                    "isp": "Amazon.com",
                                    "org": "Amazon.com"
                                }
                            }
                        }
                    },
                    "count": 1
                },
                "severity": 8.5,
                "confidence": 9.2,
                "createdAt": now,
                "title": "EC2 instance launched from malicious IP",
                "description": "An EC2 instance was launched from a known malicious IP address."
            }
        });

        let signin = json!({
            "version": "0",
            "id": Uuid::new_v4().to_string(),
            "detail-type": "AWS Console Sign In",
            "source": "aws.signin",
            "account": "643275918916",
            "time": now,
            "region": "us-east-1",
            "detail": {
                "userIdentity": {
                    "type": "IAMUser",
                    "principalId": "AIDACKCEVSQ6C2EXAMPLE",
                    "arn": "arn:aws:iam::643275918916:user/normal-user",
                    "accountId": "643275918916",
                    "userName": "normal-user"
                },
                "eventTime": now,
                "eventSource": "signin.amazonaws.com",
                "eventName": "ConsoleLogin",
                "sourceIPAddress": "203.0.113.12",
                "userAgent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
                "responseElements": { "ConsoleLogin": "Success" }
            }
        });

        vec![cloudtrail, guardduty, signin]
    }

    /// Generate a randomized flat custom event
    pub fn generate_custom_event(&mut self) -> Value {
        let event_type = CUSTOM_EVENT_TYPES[self.rng.gen_range(0..CUSTOM_EVENT_TYPES.len())];
        let severity = SEVERITY_LEVELS[self.rng.gen_range(0..SEVERITY_LEVELS.len())];
        let source_ip = SOURCE_IPS[self.rng.gen_range(0..SOURCE_IPS.len())];
        let customer = CUSTOMER_IDS[self.rng.gen_range(0..CUSTOMER_IDS.len())];

        let mut event = json!({
            "event_id": format!("evt-{}", self.rng.gen_range(100_000..1_000_000)),
            "timestamp": self.next_timestamp(),
            "event_type": event_type,
            "severity": severity,
            "source_ip": source_ip,
            "customer_id": customer,
            "user_id": format!("user-{}", self.rng.gen_range(1000..10_000)),
            "resource": format!("resource-{}", self.rng.gen_range(100..1000)),
            "metadata": { "region": "us-east-1" }
        });

        // Per-type detail fields
        let extra = match event_type {
            "failed_login" => Some(json!({
                "failed_attempts": self.rng.gen_range(1..=10)
            })),
            "malware_detected" => {
                let families = ["trojan", "virus", "ransomware", "spyware"];
                Some(json!({
                    "malware_type": families[self.rng.gen_range(0..families.len())]
                }))
            }
            "network_anomaly" => Some(json!({
                "bytes_transferred": self.rng.gen_range(1_000_000..10_000_000)
            })),
            _ => None,
        };
        if let (Some(obj), Some(Value::Object(extra))) = (event.as_object_mut(), extra) {
            obj.extend(extra);
        }

        event
    }

    /// Generate a batch of randomized custom events
    pub fn generate_batch(&mut self, count: usize) -> Vec<Value> {
        (0..count).map(|_| self.generate_custom_event()).collect()
    }
}

impl Default for EventProducer {
    fn default() -> Self {
        Self::new()
    }
}

/// Append events to a JSONL file, one record per line
pub fn write_jsonl<P: AsRef<Path>>(path: P, events: &[Value]) -> Result<(), ProducerError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;

    for event in events {
        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;
    }
    file.flush()?;

    log::info!(
        "Wrote {} events to {}",
        events.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Send events as UDP datagrams, one record per datagram
pub fn send_udp(address: &str, events: &[Value]) -> Result<(), ProducerError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;

    for event in events {
        let payload = serde_json::to_vec(event)?;
        socket.send_to(&payload, address)?;
    }

    log::info!("Sent {} events to {}", events.len(), address);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::extract_event;
    use std::io::BufRead;

    #[test]
    fn test_canonical_events_extract_cleanly() {
        let events = EventProducer::canonical_events();
        assert_eq!(events.len(), 3);

        let cloudtrail = extract_event(events[0].clone()).unwrap();
        assert_eq!(cloudtrail.event_name.as_deref(), Some("CreateUser"));
        assert_eq!(cloudtrail.source_ip.as_deref(), Some("192.168.1.100"));

        let guardduty = extract_event(events[1].clone()).unwrap();
        assert_eq!(guardduty.severity, Some(8.5));
        assert_eq!(guardduty.source_ip.as_deref(), Some("10.0.0.50"));

        let signin = extract_event(events[2].clone()).unwrap();
        assert_eq!(signin.event_name.as_deref(), Some("ConsoleLogin"));
        assert_eq!(signin.source_ip.as_deref(), Some("203.0.113.12"));
    }

    #[test]
    fn test_seeded_producer_is_reproducible() {
        let batch_a = EventProducer::with_seed(42).generate_batch(5);
        let batch_b = EventProducer::with_seed(42).generate_batch(5);
        assert_eq!(batch_a, batch_b);

        // timestamps come from the fixed base clock, not the wall
        // clock, and advance monotonically
        assert_eq!(batch_a[0]["timestamp"], "2025-06-01T12:00:00+00:00");
        assert_eq!(batch_a[1]["timestamp"], "2025-06-01T12:00:01+00:00");
    }

    #[test]
    fn test_custom_events_have_required_fields() {
        let mut producer = EventProducer::with_seed(7);
        for event in producer.generate_batch(20) {
            assert!(event["event_type"].is_string());
            assert!(event["source_ip"].is_string());
            assert!(event["severity"].is_string());
            extract_event(event).unwrap();
        }
    }

    #[test]
    fn test_write_jsonl_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let events = EventProducer::canonical_events();
        write_jsonl(&path, &events).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            serde_json::from_str::<Value>(&line).unwrap();
        }
    }
}
