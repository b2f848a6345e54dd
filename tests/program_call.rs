//! Program Call Tests
//!
//! End-to-end calls through the orchestrator against the in-process mock
//! host: encode, dispatch, simulate, decode and classify.

use std::collections::BTreeMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use hostcall::mock::{FailureConfig, HostException, MockHost, MockProgram, UNRESOLVED_PROGRAM};
use hostcall::structure::templates::{dummy_receiver, list_information, records_desired};
use hostcall::{
    CallError, CallManifest, CallOptions, CallPhase, Caller, CallerSettings, DataStructure,
    Disposition, ErrorPolicy, Fetched, IoDirection, Member, MockTransport, Outputs,
    ParameterDescriptor, Value,
};

/// Data-queue receive: returns the next entry or a zero length when empty
fn data_queue_host() -> MockHost {
    let host = MockHost::new();
    host.register(
        "QSYS",
        "QRCVDTAQ",
        None,
        MockProgram::new(|call| {
            let queue = call.input("queue").and_then(Value::as_text).unwrap_or("");
            let entry = if queue == "ORDERS" { "ORD-0042" } else { "" };
            let mut out = BTreeMap::new();
            out.insert(
                "length".to_string(),
                Value::Decimal(BigDecimal::from(entry.len() as i64)),
            );
            out.insert("data".to_string(), Value::Text(entry.to_string()));
            Ok(out)
        })
        .with_error_code("error_code"),
    );
    host
}

fn receive_params(queue: &str, policy: ErrorPolicy) -> Vec<Member> {
    vec![
        ParameterDescriptor::char(IoDirection::In, "queue", 10, queue)
            .unwrap()
            .into(),
        ParameterDescriptor::char(IoDirection::In, "library", 10, "QGPL")
            .unwrap()
            .into(),
        ParameterDescriptor::packed(IoDirection::Out, "length", 5, 0, "0")
            .unwrap()
            .into(),
        ParameterDescriptor::char(IoDirection::Out, "data", 100, "")
            .unwrap()
            .into(),
        ParameterDescriptor::packed(IoDirection::In, "wait", 5, 0, "0")
            .unwrap()
            .into(),
        policy.structure().into(),
    ]
}

fn caller_for(host: &MockHost) -> Caller {
    Caller::new(Arc::new(MockTransport::with_host(host.clone())))
}

// =============================================================================
// Successful calls
// =============================================================================

#[test]
fn test_receive_returns_sized_entry() {
    let host = data_queue_host();
    let caller = caller_for(&host);

    let outputs = caller
        .call(
            "QRCVDTAQ",
            "QSYS",
            receive_params("ORDERS", ErrorPolicy::Capture),
            CallOptions::default(),
        )
        .expect("receive should succeed");

    assert_eq!(outputs.decimal("length").unwrap(), BigDecimal::from(8));
    assert_eq!(
        outputs.fetch_sized("length", "data").unwrap(),
        Fetched::Data(Value::Text("ORD-0042".to_string()))
    );
    // Input-only parameters never appear in outputs
    assert!(outputs.get("queue").is_none());
    assert!(outputs.get("wait").is_none());
}

#[test]
fn test_empty_queue_is_empty_result() {
    let host = data_queue_host();
    let caller = caller_for(&host);

    let outputs = caller
        .call(
            "QRCVDTAQ",
            "QSYS",
            receive_params("IDLE", ErrorPolicy::Capture),
            CallOptions::default(),
        )
        .expect("empty receive is not a failure");

    assert_eq!(
        outputs.fetch_sized("length", "data").unwrap(),
        Fetched::EmptyResult
    );
}

#[test]
fn test_request_document_reaches_host_as_declared() {
    let host = data_queue_host();
    let caller = caller_for(&host);

    caller
        .call(
            "qrcvdtaq",
            "qsys",
            receive_params("ORDERS", ErrorPolicy::Capture),
            CallOptions::default(),
        )
        .unwrap();

    let requests = host.requests();
    assert_eq!(requests.len(), 1);
    let doc = &requests[0];
    assert_eq!(doc.program, "QRCVDTAQ");
    assert_eq!(doc.collection, "QSYS");
    assert_eq!(doc.params.len(), 6);
    assert_eq!(
        doc.params[0].data.as_deref(),
        Some("4f524445525320202020")
    );
    // Output-only entries carry no data
    assert!(doc.params[2].data.is_none());
}

#[test]
fn test_library_list_resolves_unqualified_call() {
    let host = MockHost::new();
    host.register("APPLIB", "ADDONE", None, MockProgram::new(|call| {
        let n = call.input("n").and_then(Value::as_i64).unwrap_or(0);
        let mut out = BTreeMap::new();
        out.insert("n".to_string(), Value::Int(n + 1));
        Ok(out)
    }));
    host.set_library_list(["QGPL", "APPLIB"]);
    let caller = caller_for(&host);

    let params = vec![ParameterDescriptor::signed(IoDirection::Both, "n", 32, 41)
        .unwrap()
        .into()];
    let outputs = caller
        .call("ADDONE", "", params, CallOptions::default())
        .unwrap();

    assert_eq!(outputs.int("n").unwrap(), 42);
}

#[test]
fn test_default_collection_from_settings() {
    let host = MockHost::new();
    host.register("APPLIB", "PING", None, MockProgram::echo());
    let settings = CallerSettings {
        default_collection: "APPLIB".to_string(),
        ..CallerSettings::default()
    };
    let caller = Caller::with_settings(Arc::new(MockTransport::with_host(host.clone())), settings);

    let outputs = caller
        .call("PING", "", Vec::new(), CallOptions::default())
        .unwrap();

    assert!(outputs.is_empty());
    assert_eq!(host.requests()[0].collection, "APPLIB");
}

#[test]
fn test_list_api_with_receiver_length_label() {
    let host = MockHost::new();
    host.register(
        "QGPL",
        "LSTORD",
        None,
        MockProgram::new(|call| {
            let length = call
                .input("receiver_length")
                .and_then(Value::as_i64)
                .unwrap_or(-1);
            let mut info = BTreeMap::new();
            info.insert("total_records".to_string(), Value::Int(3));
            info.insert("records_returned".to_string(), Value::Int(1));
            info.insert("record_length".to_string(), Value::Int(length));
            let mut out = BTreeMap::new();
            out.insert("list_info".to_string(), Value::Record(info));
            Ok(out)
        }),
    );
    let caller = caller_for(&host);

    let (receiver, receiver_length) = dummy_receiver(64);
    let params: Vec<Member> = vec![
        receiver.into(),
        receiver_length.into(),
        list_information().into(),
        records_desired(1).into(),
        ErrorPolicy::Capture.structure().into(),
    ];
    let outputs = caller
        .call("LSTORD", "QGPL", params, CallOptions::default())
        .unwrap();

    let info = outputs.record("list_info").unwrap();
    assert_eq!(info["total_records"], Value::Int(3));
    assert_eq!(info["records_returned"], Value::Int(1));
    // The receiver length was derived from the labeled structure's width
    assert_eq!(info["record_length"], Value::Int(64));
    assert!(!info.contains_key("reserved_1"));
}

// =============================================================================
// Remote failures
// =============================================================================

#[test]
fn test_capture_policy_surfaces_exception_with_outputs() {
    let host = data_queue_host();
    host.inject_exception("QRCVDTAQ", "CPF9801", "Object ORDERS in library QGPL not found.");
    let caller = caller_for(&host);

    let err = caller
        .call(
            "QRCVDTAQ",
            "QSYS",
            receive_params("ORDERS", ErrorPolicy::Capture),
            CallOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.phase(), CallPhase::RemoteFailure);
    assert_eq!(err.exit_code(), 40);
    match err {
        CallError::Remote(failure) => {
            assert_eq!(failure.exception_id, "CPF9801");
            assert!(failure.message.starts_with("Object ORDERS"));
            match failure.disposition {
                Disposition::Captured(outputs) => {
                    let record = outputs.record("error_code").unwrap();
                    assert_eq!(record["exception_id"], Value::Text("CPF9801".to_string()));
                    assert!(outputs.get("length").is_some());
                }
                other => panic!("expected captured disposition, got {:?}", other),
            }
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
}

#[test]
fn test_zero_bytes_policy_escalates() {
    let host = data_queue_host();
    host.inject_exception("QRCVDTAQ", "CPF9801", "Object ORDERS in library QGPL not found.");
    let caller = caller_for(&host);

    let err = caller
        .call(
            "QRCVDTAQ",
            "QSYS",
            receive_params("ORDERS", ErrorPolicy::Escalate),
            CallOptions::default(),
        )
        .unwrap_err();

    match err {
        CallError::Remote(failure) => {
            assert!(failure.is_escalated());
            assert_eq!(failure.exception_id, "CPF9801");
            match failure.disposition {
                Disposition::Escalated { joblog } => assert!(!joblog.is_empty()),
                other => panic!("expected escalation, got {:?}", other),
            }
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
}

#[test]
fn test_failure_clears_after_fail_count() {
    let host = data_queue_host();
    host.inject_failure(
        "QRCVDTAQ",
        FailureConfig::exception("CPF9502", "Queue locked").with_fail_count(1),
    );
    let caller = caller_for(&host);
    let call = || {
        caller.call(
            "QRCVDTAQ",
            "QSYS",
            receive_params("ORDERS", ErrorPolicy::Escalate),
            CallOptions::default(),
        )
    };

    assert!(matches!(call(), Err(CallError::Remote(_))));
    assert!(call().is_ok(), "second call should succeed once the failure is spent");
}

#[test]
fn test_handler_exception_without_error_parameter_escalates() {
    let host = MockHost::new();
    host.register(
        "LIB",
        "DIVIDE",
        None,
        MockProgram::new(|_| Err(HostException::new("MCH1211", "Attempt made to divide by zero"))),
    );
    let caller = caller_for(&host);

    let err = caller
        .invoke("DIVIDE", "LIB", Vec::new(), CallOptions::default())
        .unwrap_err();
    match err {
        CallError::Remote(failure) => {
            assert_eq!(failure.exception_id, "MCH1211");
            assert!(failure.is_escalated());
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
}

#[test]
fn test_unresolved_program() {
    let caller = caller_for(&MockHost::new());

    let err = caller
        .invoke("NOSUCH", "QGPL", Vec::new(), CallOptions::default())
        .unwrap_err();
    match err {
        CallError::Remote(failure) => assert_eq!(failure.exception_id, UNRESOLVED_PROGRAM),
        other => panic!("expected remote failure, got {:?}", other),
    }
}

// =============================================================================
// Local failures
// =============================================================================

#[test]
fn test_missing_output_is_protocol_error() {
    let host = data_queue_host();
    let caller = caller_for(&host);

    let outputs: Outputs = caller
        .call(
            "QRCVDTAQ",
            "QSYS",
            receive_params("ORDERS", ErrorPolicy::Capture),
            CallOptions::default(),
        )
        .unwrap();

    let err = outputs.text("not_declared").unwrap_err();
    assert!(matches!(err, CallError::Protocol(_)));
    assert_eq!(err.exit_code(), 30);
}

#[test]
fn test_transport_failure_after_disconnect() {
    let transport = Arc::new(MockTransport::with_host(data_queue_host()));
    transport.set_disconnected(true);
    let caller = Caller::new(transport);

    let err = caller
        .call(
            "QRCVDTAQ",
            "QSYS",
            receive_params("ORDERS", ErrorPolicy::Capture),
            CallOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.phase(), CallPhase::TransportFailure);
    assert_eq!(err.exit_code(), 20);
}

#[test]
fn test_invalid_call_never_dispatched() {
    let host = data_queue_host();
    let caller = caller_for(&host);

    let duplicate = vec![
        ParameterDescriptor::char(IoDirection::In, "queue", 10, "A")
            .unwrap()
            .into(),
        ParameterDescriptor::char(IoDirection::In, "queue", 10, "B")
            .unwrap()
            .into(),
    ];
    let err = caller
        .call("QRCVDTAQ", "QSYS", duplicate, CallOptions::default())
        .unwrap_err();

    assert!(matches!(err, CallError::Validation(_)));
    assert_eq!(err.exit_code(), 10);
    assert!(host.requests().is_empty());
}

#[test]
fn test_manifest_call_end_to_end() {
    let manifest = CallManifest::from_json(
        r#"{
            "program": "QRCVDTAQ",
            "collection": "QSYS",
            "params": [
                { "name": "queue", "type": "char", "size": 10, "io": "in", "value": "ORDERS" },
                { "name": "library", "type": "char", "size": 10, "io": "in", "value": "QGPL" },
                { "name": "length", "type": "packed", "length": 5, "io": "out" },
                { "name": "data", "type": "char", "size": 100, "io": "out" },
                { "name": "wait", "type": "packed", "length": 5, "io": "in" },
                { "type": "error_code" }
            ]
        }"#,
    )
    .unwrap();
    let request = manifest.to_request(ErrorPolicy::Capture, "").unwrap();
    let caller = caller_for(&data_queue_host());

    let outputs = Outputs::from(caller.invoke_request(&request).unwrap());
    assert_eq!(
        outputs.fetch_sized("length", "data").unwrap(),
        Fetched::Data(Value::Text("ORD-0042".to_string()))
    );
}

#[test]
fn test_array_of_structures_round_trip() {
    let line = DataStructure::new(
        "lines",
        vec![
            ParameterDescriptor::char(IoDirection::Both, "sku", 6, "")
                .unwrap()
                .into(),
            ParameterDescriptor::signed(IoDirection::Both, "qty", 16, 0)
                .unwrap()
                .into(),
        ],
    )
    .unwrap()
    .with_dimension(2);

    let host = MockHost::new();
    host.register("LIB", "ECHOLINES", None, MockProgram::echo());
    let caller = caller_for(&host);

    let outputs = caller
        .call("ECHOLINES", "LIB", vec![line.into()], CallOptions::default())
        .unwrap();

    let lines = outputs.require("lines").unwrap().as_list().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].field("sku"), Some(&Value::Text(String::new())));
    assert_eq!(lines[1].field("qty"), Some(&Value::Int(0)));
}
