//! Access-layer scenarios against the in-memory backend: context setup,
//! connection, enumeration, reflection and bridged method calls end to end.

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

use wmi_access::backend::memory::{Dispatch, MemoryClass, MemoryMethod, MemoryObject, MemoryPlatform};
use wmi_access::bridge::Delivery;
use wmi_access::object::dump::Dumper;
use wmi_access::runtime::SecurityProfile;
use wmi_access::{
    Config, ErrorKind, MethodParameters, ProcessContext, ServiceConnection, StatusCode, Variant,
};

const CIMV2: &str = r"ROOT\CIMV2";

/// Helper: a namespace with a few BIOS/process instances and an empty class.
fn seeded_platform() -> MemoryPlatform {
    let platform = MemoryPlatform::new();
    let ns = platform.namespace(CIMV2);
    ns.add_class(MemoryClass::new("Win32_BIOS"))
        .add_class(MemoryClass::new("Widget"))
        .add_class(
            MemoryClass::new("Win32_Process").with_method(
                MemoryMethod::new("Terminate")
                    .param("Reason")
                    .batch(items(2))
                    .batch(items(1))
                    .batch(items(3))
                    .dispatch(Dispatch::Threaded(Duration::from_millis(3))),
            ),
        );
    ns.add_instance(
        MemoryObject::new("Win32_BIOS")
            .with_path(r#"Win32_BIOS.Name="Default System BIOS""#)
            .with("Name", "Default System BIOS")
            .with("Manufacturer", "LENOVO")
            .with("PrimaryBIOS", true)
            .with("ReleaseDate", "20240115000000.000000+000"),
    );
    for pid in [4, 88, 412] {
        ns.add_instance(
            MemoryObject::new("Win32_Process")
                .with_path(format!("Win32_Process.Handle=\"{pid}\""))
                .with("Handle", pid)
                .with("Name", format!("proc{pid}")),
        );
    }
    platform
}

fn items(n: usize) -> Vec<wmi_access::ManagementObject> {
    (0..n)
        .map(|i| MemoryObject::new("Item").with("Id", i as i32).into_handle())
        .collect()
}

/// Helper: acquire a context and connect with defaults.
fn open(platform: &MemoryPlatform) -> ServiceConnection {
    let context =
        ProcessContext::acquire(Arc::new(platform.clone()), &SecurityProfile::default()).unwrap();
    ServiceConnection::connect(&context, CIMV2, &Config::default()).unwrap()
}

#[test]
fn empty_class_enumerates_to_end_immediately() {
    let platform = seeded_platform();
    let connection = open(&platform);

    let iter = connection.enumerate_instances("Widget").unwrap().begin().unwrap();
    assert!(iter.is_exhausted());
    assert_eq!(iter.count(), 0);
}

#[test]
fn enumeration_yields_every_instance_once() {
    let platform = seeded_platform();
    let connection = open(&platform);

    let names: Vec<String> = connection
        .enumerate_instances("Win32_Process")
        .unwrap()
        .begin()
        .unwrap()
        .map(|process| {
            process
                .unwrap()
                .get("Name")
                .unwrap()
                .coerce_to_string()
                .unwrap()
        })
        .collect();
    assert_eq!(names, vec!["proc4", "proc88", "proc412"]);
}

#[test]
fn failed_connect_does_not_leak_the_runtime() {
    let platform = seeded_platform();
    {
        let context =
            ProcessContext::acquire(Arc::new(platform.clone()), &SecurityProfile::default())
                .unwrap();
        let err =
            ServiceConnection::connect(&context, r"ROOT\Missing", &Config::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.code(), Some(StatusCode::INVALID_NAMESPACE));
    }
    assert_eq!(platform.count("uninitialize"), 1);
    assert_eq!(platform.live_connections(), 0);
}

#[test]
fn reflection_and_dump_of_a_retrieved_instance() {
    let platform = seeded_platform();
    let connection = open(&platform);

    let bios = connection
        .get_object(r#"Win32_BIOS.Name="Default System BIOS""#)
        .unwrap();
    let names = bios.property_names().unwrap();
    assert_eq!(
        names.to_vec(),
        vec!["Name", "Manufacturer", "PrimaryBIOS", "ReleaseDate"]
    );
    drop(names);

    let release = bios.get("ReleaseDate").unwrap().as_datetime().unwrap();
    assert_eq!(release.to_rfc3339(), "2024-01-15T00:00:00+00:00");

    let lines = Dumper::from_config(&connection.config().reflection)
        .lines("Win32_BIOS", 0, &bios)
        .unwrap();
    assert_eq!(lines[2], "Win32_BIOS[0].PrimaryBIOS = True");
}

#[test]
#[traced_test]
fn async_batches_arrive_before_the_call_returns() {
    let platform = seeded_platform();
    let connection = open(&platform);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let report = connection
        .invoke_method_async(
            r#"Win32_Process.Handle="88""#,
            "Terminate",
            &MethodParameters::new().with("Reason", 1i32),
            move |d: &Delivery<'_>| sink_seen.lock().push((d.batch, d.index)),
        )
        .unwrap();

    assert_eq!(report.status, StatusCode::OK);
    assert_eq!(report.batches, 3);
    assert_eq!(report.delivered, 6);
    assert_eq!(
        *seen.lock(),
        vec![(0, 0), (0, 1), (1, 0), (2, 0), (2, 1), (2, 2)]
    );
    assert!(logs_contain("asynchronous call completed"));
}

#[test]
fn undeclared_argument_is_rejected_by_the_service() {
    let platform = seeded_platform();
    let connection = open(&platform);

    let err = connection
        .invoke_method_async(
            "Win32_Process",
            "Terminate",
            &MethodParameters::new().with("Force", true),
            |_: &Delivery<'_>| {},
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodInvocation);
    assert_eq!(err.code(), Some(StatusCode::INVALID_METHOD_PARAMETERS));
    assert!(err.to_string().contains("Invalid method Parameter(s)"));
}

#[test]
fn configuration_drives_timeouts() {
    let platform = seeded_platform();
    platform
        .namespace(CIMV2)
        .add_class(MemoryClass::new("Win32_Job").with_method(
            MemoryMethod::new("Wait").dispatch(Dispatch::Never),
        ));

    let config =
        Config::from_json_str(r#"{"invocation": {"timeout": "25ms", "cancel_poll_interval": "5ms"}}"#)
            .unwrap();
    let context = ProcessContext::acquire_with(Arc::new(platform.clone()), &config).unwrap();
    let connection = ServiceConnection::connect(&context, CIMV2, &config).unwrap();

    let err = connection
        .invoke_method_async("Win32_Job", "Wait", &MethodParameters::new(), |_: &Delivery<'_>| {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(platform.count("cancel_async_call"), 1);
}

#[test]
fn values_round_out_through_sync_calls() {
    let platform = seeded_platform();
    platform.namespace(CIMV2).add_class(
        MemoryClass::new("StdRegProv").with_method(MemoryMethod::new("GetStringValue").out("sValue", "x")),
    );
    let connection = open(&platform);

    let out = connection
        .invoke_method("StdRegProv", "GetStringValue", &MethodParameters::new())
        .unwrap()
        .unwrap();
    assert!(matches!(out.get("sValue").unwrap(), Variant::String(ref s) if s == "x"));
}
