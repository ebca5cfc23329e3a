//! Bridge validation behavior, including cleanup on every exit path.

mod common;

use bridgectl::{validate, BridgeTarget, RuntimeProfile, SetupError, Timeouts};
use common::{fail, ok, ScriptedRunner};

fn bridge_inspect_json(gateway: &str) -> String {
    format!(
        r#"[
    {{
        "Name": "bridge",
        "Driver": "bridge",
        "IPAM": {{
            "Driver": "default",
            "Config": [
                {{
                    "Subnet": "10.20.1.0/24",
                    "Gateway": "{gateway}"
                }}
            ]
        }}
    }}
]
"#
    )
}

fn quick_timeouts() -> Timeouts {
    Timeouts {
        probe_secs: 2,
        probe_poll_ms: 10,
        ..Default::default()
    }
}

fn happy_runner(observed_gateway: &str) -> ScriptedRunner {
    ScriptedRunner::new()
        .on(
            &["docker", "network", "inspect", "bridge"],
            ok(&bridge_inspect_json("10.20.1.1")),
        )
        .on(
            &["ip", "-4", "addr", "show", "docker0"],
            ok("4: docker0: <BROADCAST,MULTICAST,UP> mtu 1500\n    \
                inet 10.20.1.1/24 brd 10.20.1.255 scope global docker0\n"),
        )
        .on(
            &["docker", "rm", "-f"],
            fail(1, "Error: No such container: bridgectl-netcheck"),
        )
        .on(&["docker", "network", "prune"], ok(""))
        .on(&["docker", "run"], ok("0123456789ab\n"))
        .on(&["docker", "ps"], ok("bridgectl-netcheck\n"))
        .on(
            &["docker", "exec"],
            ok(&format!("default via {observed_gateway} dev eth0\n")),
        )
}

#[tokio::test]
async fn accepts_matching_gateway() {
    let runner = happy_runner("10.20.1.1");

    validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &quick_timeouts(),
    )
    .await
    .unwrap();

    // Defensive removal up front, unconditional removal at the end.
    assert_eq!(runner.count_calls(&["docker", "rm", "-f"]), 2);
    let calls = runner.calls();
    assert_eq!(calls.last().unwrap()[..3], ["docker", "rm", "-f"]);
}

#[tokio::test]
async fn gateway_mismatch_fails_and_cleans_up() {
    let runner = happy_runner("172.17.0.1");

    let err = validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &quick_timeouts(),
    )
    .await
    .unwrap_err();

    let SetupError::Validation(message) = err else {
        panic!("expected a validation error");
    };
    assert!(message.contains("mismatch"));
    assert!(message.contains("172.17.0.1"));

    let calls = runner.calls();
    assert_eq!(calls.last().unwrap()[..3], ["docker", "rm", "-f"]);
}

#[tokio::test]
async fn launch_failure_still_removes_container() {
    let runner = ScriptedRunner::new()
        .on(
            &["docker", "network", "inspect", "bridge"],
            ok(&bridge_inspect_json("10.20.1.1")),
        )
        .on(&["ip", "-4", "addr", "show", "docker0"], fail(1, ""))
        .on(
            &["docker", "rm", "-f"],
            fail(1, "Error: No such container: bridgectl-netcheck"),
        )
        .on(&["docker", "network", "prune"], ok(""))
        .on(
            &["docker", "run"],
            fail(125, "docker: Error response from daemon: Conflict."),
        );

    let err = validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &quick_timeouts(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SetupError::Validation(_)));
    assert_eq!(runner.count_calls(&["docker", "exec"]), 0);

    let calls = runner.calls();
    assert_eq!(calls.last().unwrap()[..3], ["docker", "rm", "-f"]);
}

#[tokio::test]
async fn unapplied_live_config_fails_before_any_container() {
    let runner = ScriptedRunner::new()
        .on(
            &["docker", "network", "inspect", "bridge"],
            ok(&bridge_inspect_json("172.17.0.1")),
        )
        .on(&["ip", "-4", "addr", "show", "docker0"], fail(1, ""));

    let err = validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &quick_timeouts(),
    )
    .await
    .unwrap_err();

    let SetupError::Validation(message) = err else {
        panic!("expected a validation error");
    };
    assert!(message.contains("not applied"));
    assert_eq!(runner.count_calls(&["docker", "run"]), 0);
}

#[tokio::test]
async fn interface_miss_is_only_a_warning() {
    let runner = ScriptedRunner::new()
        .on(
            &["docker", "network", "inspect", "bridge"],
            ok(&bridge_inspect_json("10.20.1.1")),
        )
        .on(
            &["ip", "-4", "addr", "show", "docker0"],
            fail(1, "Device \"docker0\" does not exist."),
        )
        .on(
            &["docker", "rm", "-f"],
            fail(1, "Error: No such container: bridgectl-netcheck"),
        )
        .on(&["docker", "network", "prune"], ok(""))
        .on(&["docker", "run"], ok("0123456789ab\n"))
        .on(&["docker", "ps"], ok("bridgectl-netcheck\n"))
        .on(&["docker", "exec"], ok("default via 10.20.1.1 dev eth0\n"));

    validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &quick_timeouts(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn container_not_running_fails_and_cleans_up() {
    let runner = ScriptedRunner::new()
        .on(
            &["docker", "network", "inspect", "bridge"],
            ok(&bridge_inspect_json("10.20.1.1")),
        )
        .on(&["ip", "-4", "addr", "show", "docker0"], fail(1, ""))
        .on(
            &["docker", "rm", "-f"],
            fail(1, "Error: No such container: bridgectl-netcheck"),
        )
        .on(&["docker", "network", "prune"], ok(""))
        .on(&["docker", "run"], ok("0123456789ab\n"))
        .on(&["docker", "ps"], ok(""));

    let err = validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &quick_timeouts(),
    )
    .await
    .unwrap_err();

    let SetupError::Validation(message) = err else {
        panic!("expected a validation error");
    };
    assert!(message.contains("not running"));

    let calls = runner.calls();
    assert_eq!(calls.last().unwrap()[..3], ["docker", "rm", "-f"]);
}

#[tokio::test]
async fn route_probe_polls_until_visible() {
    let runner = ScriptedRunner::new()
        .on(
            &["docker", "network", "inspect", "bridge"],
            ok(&bridge_inspect_json("10.20.1.1")),
        )
        .on(&["ip", "-4", "addr", "show", "docker0"], fail(1, ""))
        .on(
            &["docker", "rm", "-f"],
            fail(1, "Error: No such container: bridgectl-netcheck"),
        )
        .on(&["docker", "network", "prune"], ok(""))
        .on(&["docker", "run"], ok("0123456789ab\n"))
        .on(&["docker", "ps"], ok("bridgectl-netcheck\n"))
        .on_seq(
            &["docker", "exec"],
            vec![ok(""), ok("default via 10.20.1.1 dev eth0\n")],
        );

    validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &quick_timeouts(),
    )
    .await
    .unwrap();

    assert_eq!(runner.count_calls(&["docker", "exec"]), 2);
}

#[tokio::test]
async fn route_never_appearing_times_out() {
    let runner = ScriptedRunner::new()
        .on(
            &["docker", "network", "inspect", "bridge"],
            ok(&bridge_inspect_json("10.20.1.1")),
        )
        .on(&["ip", "-4", "addr", "show", "docker0"], fail(1, ""))
        .on(
            &["docker", "rm", "-f"],
            fail(1, "Error: No such container: bridgectl-netcheck"),
        )
        .on(&["docker", "network", "prune"], ok(""))
        .on(&["docker", "run"], ok("0123456789ab\n"))
        .on(&["docker", "ps"], ok("bridgectl-netcheck\n"))
        .on(&["docker", "exec"], ok(""));

    let timeouts = Timeouts {
        probe_secs: 1,
        probe_poll_ms: 50,
        ..Default::default()
    };

    let err = validate(
        &runner,
        &RuntimeProfile::packaged(),
        &BridgeTarget::default(),
        &timeouts,
    )
    .await
    .unwrap_err();

    let SetupError::Validation(message) = err else {
        panic!("expected a validation error");
    };
    assert!(message.contains("no default route"));
}
