//! Integration tests for the Aqueduct recipe client

mod common;

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aqueduct::device::pump::{Mode, RateUnits, Status};
use aqueduct::device::syringe;
use aqueduct::device::{
    Balance, MassFlowMeter, OpticalDensityProbe, PeristalticPump, PhProbe, PinchValve, PressureTransducer,
    SolenoidValve, SyringePump, TemperatureProbe, TestDevice,
};
use aqueduct::ipc::ExchangeOutcome;
use aqueduct::pid::ParameterUpdate;
use aqueduct::sim::{spawn_model, FillingModel};
use aqueduct::ui::{Dtype, InputOptions, InputType};
use aqueduct::units::{MassFlowUnits, PressureUnits, TemperatureUnits};
use aqueduct::{Controller, ControllerSchedule, Error, Pid, Schedule};

use common::{device, live};

fn setup() -> Value {
    json!([
        device(1, "peristaltic_pump", "PUMP", 0, vec![json!({"mm": 2.5})]),
        device(2, "balance", "BAL", 0, vec![json!({"g": 10.0})]),
        device(3, "pressure_transducer", "PT", 1, vec![json!({"v": 760.0}), json!({"v": null})]),
        device(4, "ph_probe", "PH", 0, vec![json!({"v": 7.0}), json!({"v": 6.5}), json!({"v": 7.2})]),
        device(5, "optical_density_probe", "OD", 0, vec![json!({"od": 0.8, "t": 120.0, "n": 30.0})]),
        device(6, "pinch_valve", "PV", 0, vec![json!({"p": 0.5})]),
        device(7, "syringe_pump", "SP", 0, vec![json!({"um": 50.0})]),
        device(8, "solenoid_valve", "SV", 0, vec![json!({"p": 1}), json!({"p": 0})]),
        device(9, "mass_flow_meter", "MFM", 0, vec![json!({"v": 10.0})]),
        device(10, "temperature_probe", "TEMP", 0, vec![json!({"v": 25.0})]),
        device(11, "test_device", "TD", 0, vec![json!({"v": 1.0}), json!({"v": 2.0})]),
    ])
}

/// Answers like an application holding `setup()`.
fn app(event: &str, payload: &Value) -> Option<Value> {
    Some(match event {
        "get_setup" => json!({ "devices": setup() }),
        "get_device_live" => {
            let id = payload["device_id"].as_u64().unwrap_or(0);
            let entries = setup()
                .as_array()
                .unwrap()
                .iter()
                .find(|d| d["base"]["device_id"] == json!(id))
                .map(|d| d["live"].as_array().unwrap().clone())
                .unwrap_or_default();
            live(id, entries)
        }
        "create_pid_controller" => json!({ "id": 12 }),
        "prompt" | "input" => json!({ "id": 3 }),
        _ => json!({}),
    })
}

fn initialized() -> (aqueduct::Aqueduct, common::FakeAqueduct) {
    let (mut aq, fake) = common::start(false, app);
    aq.initialize(true).unwrap();
    assert_eq!(fake.next().0, "initialize");
    assert_eq!(fake.next().0, "get_setup");
    (aq, fake)
}

// ============================================================================
// SESSION TESTS
// ============================================================================

#[test]
fn test_registration_sends_process_id() {
    let (mut aq, fake) = common::start(true, app);

    let (event, payload) = fake.next();
    assert_eq!(event, "register_process");
    assert_eq!(payload["user_id"], json!("test_user"));
    assert_eq!(payload["pid"], json!(std::process::id()));

    aq.initialize(false).unwrap();
    assert_eq!(fake.next_of("initialize")["init"], json!(false));
    assert_eq!(aq.devices().len(), 11);
}

#[test]
fn test_setup_management() {
    let (mut aq, fake) = initialized();

    aq.clear_setup().unwrap();
    assert!(aq.devices().is_empty());
    assert_eq!(fake.next().0, "clear_setup");

    aq.add_device(aqueduct::DeviceType::PhProbe, "PH", 3).unwrap();
    let (event, payload) = fake.next();
    assert_eq!(event, "add_device");
    assert_eq!(payload["type"], json!("ph_probe"));
    assert_eq!(payload["size"], json!(3));

    aq.get_setup().unwrap();
    let ph: PhProbe = aq.device("PH").unwrap();
    assert_eq!(ph.len(), 3);
}

#[test]
fn test_device_lookup_checks_type() {
    let (aq, _fake) = initialized();
    assert!(aq.device::<Balance>("BAL").is_ok());
    assert!(matches!(aq.device::<Balance>("PUMP"), Err(Error::WrongDeviceType { .. })));
    assert!(matches!(aq.device::<Balance>("NOPE"), Err(Error::UnknownDevice(_))));
}

#[test]
fn test_log_lines_are_forwarded() {
    let (aq, fake) = initialized();
    aq.warning("low reservoir").unwrap();
    aq.critical("overpressure").unwrap();

    let first = fake.next_of("log");
    assert_eq!(first["level"], json!("warning"));
    assert_eq!(first["message"], json!("low reservoir"));
    assert_eq!(fake.next_of("log")["level"], json!("critical"));
}

// ============================================================================
// TRANSPORT TESTS
// ============================================================================

#[test]
fn test_silent_application_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let (mut aq, fake) = common::start(false, move |event, payload| {
        if event == "get_setup" && seen.fetch_add(1, Ordering::SeqCst) == 0 {
            return None;
        }
        app(event, payload)
    });

    aq.get_setup().unwrap();
    assert_eq!(fake.next().0, "get_setup");
    assert_eq!(fake.next().0, "get_setup");

    let report = aq.metrics();
    assert_eq!(report.retries, 1);
    assert_eq!(report.failures, 0);
    assert!(aq
        .diagnostics()
        .read_all()
        .iter()
        .any(|r| matches!(r.outcome, ExchangeOutcome::Retried { attempt: 1, .. })));
}

#[test]
fn test_no_response_after_every_attempt() {
    let (aq, fake) = common::start(false, |event, payload| {
        if event == "log" {
            None
        } else {
            app(event, payload)
        }
    });

    match aq.info("hello") {
        Err(Error::NoResponse { event, attempts }) => {
            assert_eq!(event, "log");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected NoResponse, got {other:?}"),
    }
    for _ in 0..3 {
        assert_eq!(fake.next().0, "log");
    }
    assert_eq!(aq.metrics().failures, 1);
}

#[test]
fn test_error_payload_is_a_rejection() {
    let (aq, _fake) = common::start(false, |event, payload| {
        if event == "log" {
            Some(json!({ "error": "log is full" }))
        } else {
            app(event, payload)
        }
    });

    match aq.info("hello") {
        Err(Error::Rejected { event, message }) => {
            assert_eq!(event, "log");
            assert_eq!(message, "log is full");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

// ============================================================================
// DEVICE TESTS
// ============================================================================

#[test]
fn test_pump_start_and_read() {
    let (aq, fake) = initialized();
    let pump: PeristalticPump = aq.device("PUMP").unwrap();

    let mut commands = pump.make_commands();
    let start = PeristalticPump::make_start_command(Mode::Continuous, Status::Clockwise, 1.0, RateUnits::MlMin);
    pump.set_command(&mut commands, 0, start).unwrap();
    pump.start(&commands, Some(true)).unwrap();

    let (event, payload) = fake.next();
    assert_eq!(event, "device_action");
    assert_eq!(payload["device_id"], json!(1));
    assert_eq!(payload["action"], json!("start"));
    assert_eq!(payload["record"], json!(true));
    assert_eq!(payload["command"]["commands"][0], json!([0, 1, 3, 1.0, null, null]));

    assert_eq!(pump.get_ml_min().unwrap(), vec![2.5]);

    pump.stop(None).unwrap();
    let stop = fake.next_of("device_action");
    assert_eq!(stop["action"], json!("stop"));
    assert_eq!(stop["command"]["commands"], json!([1]));
}

#[test]
fn test_sensor_reads() {
    let (aq, _fake) = initialized();

    let pt: PressureTransducer = aq.device("PT").unwrap();
    assert_eq!(pt.torr().unwrap(), vec![Some(760.0), None]);
    let atm = pt.atm().unwrap();
    assert!((atm[0].unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(atm[1], None);

    let bal: Balance = aq.device("BAL").unwrap();
    assert_eq!(bal.grams().unwrap(), vec![10.0]);
    assert_eq!(bal.milligrams().unwrap(), vec![10_000.0]);
    assert!((bal.kilograms().unwrap()[0] - 0.01).abs() < 1e-12);

    let ph: PhProbe = aq.device("PH").unwrap();
    assert_eq!(ph.value(1).unwrap(), Some(6.5));
    assert_eq!(ph.value(9).unwrap(), None);

    let od: OpticalDensityProbe = aq.device("OD").unwrap();
    let reading = od.value(0).unwrap().unwrap();
    assert_eq!(reading.optical_density, Some(0.8));
    assert_eq!(reading.transmitted, Some(120.0));
    assert_eq!(reading.ninety_deg, Some(30.0));

    let pv: PinchValve = aq.device("PV").unwrap();
    assert_eq!(pv.get_pct_open().unwrap(), vec![0.5]);
}

#[test]
fn test_live_data_for_another_device_is_refused() {
    let (mut aq, _fake) = common::start(false, |event, payload| {
        if event == "get_device_live" {
            Some(live(99, vec![json!({"g": 1.0})]))
        } else {
            app(event, payload)
        }
    });
    aq.get_setup().unwrap();
    let bal: Balance = aq.device("BAL").unwrap();
    assert!(matches!(bal.grams(), Err(Error::Rejected { .. })));
}

#[test]
fn test_pressure_sim_values_are_sent_in_torr() {
    let (aq, fake) = initialized();
    let pt: PressureTransducer = aq.device("PT").unwrap();

    pt.set_sim_values(&[Some(1.0)], PressureUnits::Psi).unwrap();
    let payload = fake.next_of("device_action");
    assert_eq!(payload["action"], json!("set_sim_values"));

    let nodes = payload["command"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    let torr = nodes[0][0].as_f64().unwrap();
    assert!((torr - 51.7149).abs() < 1e-3, "got {torr}");
    assert_eq!(nodes[0][1], Value::Null);
    assert_eq!(nodes[1], json!([null, null, null]));
}

#[test]
fn test_syringe_pump_and_solenoid_valve() {
    let (aq, fake) = initialized();

    let sp: SyringePump = aq.device("SP").unwrap();
    let mut commands = sp.make_commands();
    let start = SyringePump::make_start_command(Mode::Continuous, RateUnits::UlMin, 20.0, syringe::Status::Withdrawing);
    sp.set_command(&mut commands, 0, start).unwrap();
    sp.start(&commands, None).unwrap();
    let payload = fake.next_of("device_action");
    assert_eq!(payload["device_id"], json!(7));
    assert_eq!(payload["command"]["commands"][0], json!([0, 2, 1, 20.0, null, null]));
    assert_eq!(sp.get_ul_min().unwrap(), vec![50.0]);

    let sv: SolenoidValve = aq.device("SV").unwrap();
    let mut commands = sv.make_commands();
    sv.set_command(&mut commands, 1, SolenoidValve::make_set_position_command(1))
        .unwrap();
    sv.set_position(&commands, Some(true)).unwrap();
    let payload = fake.next_of("device_action");
    assert_eq!(payload["action"], json!("set_valve_position"));
    assert_eq!(payload["command"]["commands"], json!([null, 1]));
    assert_eq!(sv.is_open().unwrap(), vec![true, false]);
}

#[test]
fn test_flow_and_temperature_reads_convert_units() {
    let (aq, _fake) = initialized();

    let mfm: MassFlowMeter = aq.device("MFM").unwrap();
    assert_eq!(mfm.ul_min().unwrap(), vec![Some(10.0)]);
    assert!((mfm.ul_hr().unwrap()[0].unwrap() - 600.0).abs() < 1e-9);

    let temp: TemperatureProbe = aq.device("TEMP").unwrap();
    assert_eq!(temp.celsius().unwrap(), vec![Some(25.0)]);
    assert!((temp.fahrenheit().unwrap()[0].unwrap() - 77.0).abs() < 1e-9);

    let td: TestDevice = aq.device("TD").unwrap();
    assert_eq!(td.get_all_values().unwrap(), vec![Some(1.0), Some(2.0)]);
}

#[test]
fn test_flow_and_temperature_sim_data_use_base_units() {
    let (aq, fake) = initialized();

    let mfm: MassFlowMeter = aq.device("MFM").unwrap();
    mfm.set_sim_values(&[Some(0.5)], MassFlowUnits::MlMin).unwrap();
    let payload = fake.next_of("device_action");
    assert!((payload["command"][0][0].as_f64().unwrap() - 500.0).abs() < 1e-9);

    let temp: TemperatureProbe = aq.device("TEMP").unwrap();
    temp.set_sim_values(&[Some(77.0)], TemperatureUnits::Fahrenheit).unwrap();
    let payload = fake.next_of("device_action");
    assert!((payload["command"][0][0].as_f64().unwrap() - 25.0).abs() < 1e-9);

    // a rate is a difference, so no offset is applied
    temp.set_sim_rates_of_change(&[Some(9.0)], TemperatureUnits::Fahrenheit).unwrap();
    let payload = fake.next_of("device_action");
    assert_eq!(payload["command"][0][0], Value::Null);
    assert!((payload["command"][0][1].as_f64().unwrap() - 5.0).abs() < 1e-9);

    let td: TestDevice = aq.device("TD").unwrap();
    td.set_roc(&[Some(1.0), Some(-1.0)]).unwrap();
    let payload = fake.next_of("device_action");
    assert_eq!(payload["command"], json!([[null, 1.0, null], [null, -1.0, null]]));
}

#[test]
fn test_clear_recorded_is_acknowledged() {
    let (aq, fake) = initialized();
    let bal: Balance = aq.device("BAL").unwrap();

    bal.clear_recorded().unwrap();
    let payload = fake.next_of("clear_device_recordable");
    assert_eq!(payload["device_id"], json!(2));
    assert_eq!(aq.metrics().retries, 0);
}

#[test]
fn test_hardware_devices_cannot_be_simulated() {
    let (aq, _fake) = initialized();
    let pv: PinchValve = aq.device("PV").unwrap();
    assert!(matches!(
        pv.set_sim_data(Some(&[Some(0.1)]), None, None, 1.0),
        Err(Error::NoSimValues(_))
    ));
}

#[test]
fn test_command_delay_applies_to_existing_handles() {
    let (aq, _fake) = initialized();
    let pt: PressureTransducer = aq.device("PT").unwrap();
    assert_eq!(pt.command_delay(), Duration::from_millis(10));

    aq.set_command_delay(Duration::from_millis(50));
    assert_eq!(pt.command_delay(), Duration::from_millis(50));
}

// ============================================================================
// PID TESTS
// ============================================================================

fn fill_pid() -> Pid {
    let mut pid = Pid::new(20.0);
    pid.output_limits = (Some(0.0), Some(100.0));
    pid.add_schedule(Schedule::new(
        Controller {
            kp: 10.0,
            kd: 5.0,
            ..Default::default()
        },
        ControllerSchedule::default(),
    ));
    pid.enabled = true;
    pid
}

#[test]
fn test_pid_controller_lifecycle() {
    let (aq, fake) = initialized();
    let pump: PeristalticPump = aq.device("PUMP").unwrap();
    let bal: Balance = aq.device("BAL").unwrap();

    let mut controller = aq
        .pid_controller(
            "fill_controller",
            bal.to_pid_process_value(0).unwrap(),
            pump.to_pid_control_value(0).unwrap(),
            fill_pid(),
        )
        .unwrap();
    assert_eq!(controller.id(), 12);
    assert_eq!(controller.name(), Some("fill_controller"));

    let created = fake.next_of("create_pid_controller");
    let body = &created["controller"];
    assert_eq!(body["name"], json!("fill_controller"));
    assert_eq!(body["input"], json!({"kind": 4, "units": 0, "device_id": 2, "index": 0}));
    assert_eq!(body["output"], json!({"kind": 5, "units": 3, "device_id": 1, "index": 0}));
    assert_eq!(body["pid"]["setpoint"], json!(20.0));
    assert_eq!(body["pid"]["enabled"], json!(true));

    controller
        .change_parameters(
            0,
            &ParameterUpdate {
                kp: Some(30.0),
                kd: Some(10.0),
                ..Default::default()
            },
        )
        .unwrap();
    let edited = fake.next_of("edit_pid_controller");
    assert_eq!(edited["id"], json!(12));
    assert_eq!(edited["pid"]["schedule"][0]["parameters"]["kp"], json!(30.0));

    controller.change_setpoint(40.0).unwrap();
    assert_eq!(fake.next_of("edit_pid_controller")["pid"]["setpoint"], json!(40.0));

    assert!(matches!(
        controller.change_parameters(2, &ParameterUpdate::default()),
        Err(Error::ScheduleIndex { index: 2, len: 1 })
    ));

    controller.disable().unwrap();
    assert_eq!(fake.next_of("edit_pid_controller")["pid"]["enabled"], json!(false));

    controller.delete().unwrap();
    assert_eq!(fake.next().0, "delete_pid_controller");
}

#[test]
fn test_rejected_edit_keeps_definition() {
    let (aq, _fake) = common::start(false, |event, payload| {
        if event == "edit_pid_controller" {
            Some(json!({ "error": "controller is locked" }))
        } else {
            app(event, payload)
        }
    });
    let mut controller = aq
        .pid_controller(
            "p",
            aqueduct::AccessorData {
                kind: aqueduct::AccessorKind::Ph,
                units: 0,
                device_id: 4,
                index: 0,
            },
            aqueduct::AccessorData {
                kind: aqueduct::AccessorKind::PeristalticRate,
                units: 3,
                device_id: 1,
                index: 0,
            },
            fill_pid(),
        )
        .unwrap();

    assert!(controller.change_setpoint(99.0).is_err());
    assert_eq!(controller.pid().setpoint, 20.0);
}

#[test]
fn test_invalid_pid_is_not_sent() {
    let (aq, fake) = initialized();
    let pump: PeristalticPump = aq.device("PUMP").unwrap();
    let bal: Balance = aq.device("BAL").unwrap();

    let mut pid = fill_pid();
    pid.output_limits = (Some(100.0), Some(0.0));
    let result = aq.pid_controller(
        "bad",
        bal.to_pid_process_value(0).unwrap(),
        pump.to_pid_control_value(0).unwrap(),
        pid,
    );
    assert!(matches!(result, Err(Error::InvalidPid(_))));
    assert!(fake.requests.try_recv().is_err());
}

// ============================================================================
// UI TESTS
// ============================================================================

#[test]
fn test_setpoint_and_recordable() {
    let (aq, fake) = common::start(false, |event, payload| match event {
        "get_setpoint" => Some(json!({ "value": 55 })),
        _ => app(event, payload),
    });

    let sp = aq.setpoint("increment", 50, Dtype::Float).unwrap();
    let created = fake.next_of("setpoint");
    assert_eq!(created["setpoint"], json!({"name": "increment", "value": 50.0, "dtype": "float"}));
    assert_eq!(sp.as_f64().unwrap(), 55.0);

    let rec = aq.recordable("volume", 1.0, Dtype::Float).unwrap();
    rec.update(2.5).unwrap();
    let update = fake.next_of("update_recordable");
    assert_eq!(update["name"], json!("volume"));
    assert_eq!(update["value"], json!(2.5));
    assert!(matches!(rec.update("full"), Err(Error::InvalidValue { .. })));

    rec.clear().unwrap();
    assert_eq!(fake.next_of("clear_recordable")["name"], json!("volume"));
}

#[test]
fn test_pausing_prompt_waits_for_dismissal() {
    let polls = Arc::new(AtomicUsize::new(0));
    let seen = polls.clone();
    let (aq, _fake) = common::start(false, move |event, payload| match event {
        "get_prompt" => {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            Some(json!({ "active": n < 2 }))
        }
        _ => app(event, payload),
    });

    let prompt = aq.prompt("check tubing", true).unwrap();
    assert_eq!(polls.load(Ordering::SeqCst), 3);
    assert!(!prompt.is_active().unwrap());
}

#[test]
fn test_non_pausing_input() {
    let polls = Arc::new(AtomicUsize::new(0));
    let seen = polls.clone();
    let (aq, fake) = common::start(false, move |event, payload| match event {
        "get_input" => {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            Some(if n == 0 { json!({ "value": null }) } else { json!({ "value": "batch-7" }) })
        }
        _ => app(event, payload),
    });

    let input = aq
        .input(
            "batch name",
            InputOptions {
                pause_recipe: false,
                ..Default::default()
            },
        )
        .unwrap();
    let created = fake.next_of("input");
    assert_eq!(created["input"]["dtype"], json!("str"));
    assert_eq!(created["input"]["input_type"], json!("text"));

    assert_eq!(input.get_value().unwrap(), None);
    assert!(input.is_set().unwrap());
    assert_eq!(input.get_value().unwrap(), Some(json!("batch-7")));
}

fn structured_input(input_type: InputType, text: &'static str) -> Value {
    let (aq, fake) = common::start(false, move |event, payload| match event {
        "get_input" => Some(json!({ "value": text })),
        _ => app(event, payload),
    });
    let input = aq
        .input(
            "plate layout",
            InputOptions {
                pause_recipe: false,
                input_type,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(fake.next_of("input")["input"]["input_type"], json!(input_type));
    input.get_value().unwrap().unwrap()
}

#[test]
fn test_table_input_value_is_decoded() {
    let value = structured_input(InputType::Table, r#"[{"name": "rate", "value": 2.5}]"#);
    assert_eq!(value, json!([{"name": "rate", "value": 2.5}]));
}

#[test]
fn test_csv_input_value_is_decoded() {
    let value = structured_input(InputType::Csv, r#"[["t", "v"], [0, 1.5]]"#);
    assert_eq!(value[1], json!([0, 1.5]));
}

// ============================================================================
// SIMULATION TESTS
// ============================================================================

#[test]
fn test_filling_model_feeds_the_balance() {
    let (aq, fake) = initialized();
    let pump: PeristalticPump = aq.device("PUMP").unwrap();
    let bal: Balance = aq.device("BAL").unwrap();

    let model = spawn_model(FillingModel::new(pump, 0, bal, 0).unwrap(), Duration::from_millis(5));
    let payload = loop {
        let payload = fake.next_of("device_action");
        if payload["action"] == json!("set_sim_values") {
            break payload;
        }
    };
    assert_eq!(payload["device_id"], json!(2));
    let roc = payload["command"][0][1].as_f64().unwrap();
    assert!((roc - 2.5 / 60.0).abs() < 1e-12);

    model.stop().unwrap();
}
