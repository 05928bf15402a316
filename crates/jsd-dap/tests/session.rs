mod common;

use common::{Program, TestClient, top_frame, variable_pairs};
use rstest::rstest;
use serde_json::json;

const ASSIGNMENTS: &str = "var x = 1;\nconsole.log(x);\nx = 2;\n";

const ADD: &str = r#"function add(a, b) {
  var sum = a + b;
  return sum;
}
var total = add(1, 2);
console.log(total);
"#;

fn event_names(events: &[serde_json::Value]) -> Vec<&str> {
    events.iter().map(|e| e["event"].as_str().unwrap()).collect()
}

#[test]
fn test_breakpoint_end_to_end() {
    let program = Program::new(ASSIGNMENTS);
    let mut client = TestClient::start();

    client.initialize();
    assert_eq!(client.launch(&program, json!({"stopOnEntry": false}))["success"], true);
    let breakpoints = client.set_breakpoints(program.path(), &[3]);
    let breakpoint_id = breakpoints["body"]["breakpoints"][0]["id"].as_i64().unwrap();
    assert_eq!(client.configuration_done()["success"], true);

    let events = client.events_until("stopped");
    assert_eq!(event_names(&events), vec!["output", "stopped"]);
    assert_eq!(events[0]["body"]["output"], "1\n");
    assert_eq!(events[0]["body"]["category"], "console");
    assert_eq!(events[1]["body"]["reason"], "breakpoint");
    assert_eq!(events[1]["body"]["threadId"], 1);
    assert_eq!(events[1]["body"]["allThreadsStopped"], true);
    assert_eq!(events[1]["body"]["hitBreakpointIds"], json!([breakpoint_id]));

    let stack_trace = client.stack_trace();
    assert_eq!(top_frame(&stack_trace).2, 3);
    assert_eq!(stack_trace["body"]["stackFrames"][0]["source"]["path"], program.path());

    assert_eq!(client.resume("continue")["body"]["allThreadsContinued"], true);

    let events = client.events_until("terminated");
    assert_eq!(event_names(&events), vec!["exited", "terminated"]);
    assert_eq!(events[0]["body"]["exitCode"], 0);

    assert_eq!(client.request("disconnect", None)["success"], true);
    client.join();
}

#[test]
fn test_uncaught_error_end_to_end() {
    let program = Program::new("throw new Error(\"x\")\n");
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.configuration_done();

    let events = client.events_until("terminated");
    assert_eq!(event_names(&events), vec!["output", "exited", "terminated"]);
    assert_eq!(events[0]["body"]["category"], "stderr");
    assert!(events[0]["body"]["output"].as_str().unwrap().contains("Error: x"));
    assert_eq!(events[1]["body"]["exitCode"], 1);

    client.finish();
}

#[test]
fn test_breakpoints_are_replaced_not_accumulated() {
    let program = Program::new("var a = 1;\nvar b = 2;\nvar c = 3;\n");
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    let first = client.set_breakpoints(program.path(), &[1, 2]);
    let second = client.set_breakpoints(program.path(), &[3]);

    let first_ids = first["body"]["breakpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|bp| bp["id"].as_i64().unwrap())
        .collect::<Vec<_>>();
    let second_breakpoints = second["body"]["breakpoints"].as_array().unwrap();
    assert_eq!(second_breakpoints.len(), 1);
    assert_eq!(second_breakpoints[0]["line"], 3);
    assert_eq!(second_breakpoints[0]["verified"], true);
    assert!(first_ids.windows(2).all(|ids| ids[0] < ids[1]));
    assert!(second_breakpoints[0]["id"].as_i64().unwrap() > *first_ids.last().unwrap());

    client.configuration_done();
    let stopped = client.wait_event("stopped");
    assert_eq!(stopped["body"]["reason"], "breakpoint");
    assert_eq!(top_frame(&client.stack_trace()).2, 3);

    client.resume("continue");
    let events = client.events_until("terminated");
    assert!(!event_names(&events).contains(&"stopped"));

    client.finish();
}

#[rstest]
#[case::same_path(false)]
#[case::different_directory(true)]
fn test_breakpoints_before_launch(#[case] foreign_directory: bool) {
    let program = Program::new(ASSIGNMENTS);
    let mut client = TestClient::start();

    client.initialize();
    let path = if foreign_directory {
        "/somewhere/else/main.js".to_string()
    } else {
        program.path().to_string()
    };
    assert_eq!(client.set_breakpoints(&path, &[3])["success"], true);
    client.launch(&program, json!({}));
    client.configuration_done();

    let stopped = client.wait_event("stopped");
    assert_eq!(stopped["body"]["reason"], "breakpoint");
    assert_eq!(top_frame(&client.stack_trace()).2, 3);

    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_breakpoints_survive_relaunch() {
    let program = Program::new(ASSIGNMENTS);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    let breakpoints = client.set_breakpoints(program.path(), &[3]);
    let breakpoint_id = breakpoints["body"]["breakpoints"][0]["id"].as_i64().unwrap();
    assert_eq!(client.launch(&program, json!({}))["success"], true);
    client.configuration_done();

    let stopped = client.wait_event("stopped");
    assert_eq!(stopped["body"]["reason"], "breakpoint");
    assert_eq!(stopped["body"]["hitBreakpointIds"], json!([breakpoint_id]));
    assert_eq!(top_frame(&client.stack_trace()).2, 3);

    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_stop_on_entry() {
    let program = Program::new(ASSIGNMENTS);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({"stopOnEntry": true}));
    client.configuration_done();

    let events = client.events_until("stopped");
    assert_eq!(event_names(&events), vec!["stopped"]);
    assert_eq!(events[0]["body"]["reason"], "step");
    assert!(events[0]["body"]["hitBreakpointIds"].is_null());
    assert_eq!(top_frame(&client.stack_trace()).2, 1);

    client.resume("continue");
    let events = client.events_until("terminated");
    assert_eq!(event_names(&events), vec!["output", "exited", "terminated"]);

    client.finish();
}

#[test]
fn test_step_over_into_and_out() {
    let program = Program::new(ADD);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[5]);
    client.configuration_done();
    client.wait_event("stopped");

    client.resume("stepIn");
    assert_eq!(client.wait_event("stopped")["body"]["reason"], "step");
    let stack_trace = client.stack_trace();
    assert_eq!(top_frame(&stack_trace), (1, "add".to_string(), 2));
    assert_eq!(stack_trace["body"]["totalFrames"], 2);
    assert_eq!(stack_trace["body"]["stackFrames"][1]["line"], 5);

    client.resume("next");
    client.wait_event("stopped");
    assert_eq!(top_frame(&client.stack_trace()).2, 3);

    client.resume("stepOut");
    client.wait_event("stopped");
    let stack_trace = client.stack_trace();
    assert_eq!(top_frame(&stack_trace).2, 6);
    assert_eq!(stack_trace["body"]["totalFrames"], 1);

    client.resume("next");
    let events = client.events_until("terminated");
    assert_eq!(event_names(&events), vec!["output", "exited", "terminated"]);
    assert_eq!(events[0]["body"]["output"], "3\n");

    client.finish();
}

#[test]
fn test_next_steps_over_calls() {
    let program = Program::new(ADD);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({"stopOnEntry": true}));
    client.configuration_done();
    client.wait_event("stopped");
    assert_eq!(top_frame(&client.stack_trace()).2, 5);

    client.resume("next");
    client.wait_event("stopped");
    let stack_trace = client.stack_trace();
    assert_eq!(top_frame(&stack_trace).2, 6);
    assert_eq!(stack_trace["body"]["totalFrames"], 1);

    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_scopes_and_variables() {
    let program = Program::new(ADD);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[3]);
    client.configuration_done();
    client.wait_event("stopped");

    let (frame_id, name, _) = top_frame(&client.stack_trace());
    assert_eq!(name, "add");

    let scopes = client.scopes(frame_id);
    let names = scopes["body"]["scopes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Local", "Global"]);

    let locals = client.scope_variables(frame_id, "Local");
    for expected in [("a", "1"), ("b", "2"), ("sum", "3")] {
        assert!(
            locals.contains(&(expected.0.to_string(), expected.1.to_string())),
            "missing {:?} in {:?}",
            expected,
            locals
        );
    }

    let globals = client.scope_variables(frame_id, "Global");
    assert!(globals.contains(&("add".to_string(), "[Function: add]".to_string())));
    assert!(globals.iter().all(|(name, _)| name != "console" && name != "Math"));

    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_composite_values_expand() {
    let program = Program::new("var point = {x: 1, y: \"two\"};\nvar list = [10, 20];\nvar done = true;\n");
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[3]);
    client.configuration_done();
    client.wait_event("stopped");

    let (frame_id, ..) = top_frame(&client.stack_trace());
    let scopes = client.scopes(frame_id);
    let global_reference = scopes["body"]["scopes"][1]["variablesReference"].as_i64().unwrap();
    let globals = client.variables(global_reference);
    let globals = globals["body"]["variables"].as_array().unwrap();

    let point = globals.iter().find(|v| v["name"] == "point").unwrap();
    assert_eq!(point["value"], "{x, y}");
    assert_eq!(point["type"], "object");
    let point_reference = point["variablesReference"].as_i64().unwrap();
    assert!(point_reference > 0);

    let list = globals.iter().find(|v| v["name"] == "list").unwrap();
    assert_eq!(list["value"], "Array[2]");
    let list_reference = list["variablesReference"].as_i64().unwrap();

    assert_eq!(
        variable_pairs(&client.variables(point_reference)),
        vec![("x".to_string(), "1".to_string()), ("y".to_string(), "\"two\"".to_string())]
    );
    assert_eq!(
        variable_pairs(&client.variables(list_reference)),
        vec![
            ("length".to_string(), "2".to_string()),
            ("0".to_string(), "10".to_string()),
            ("1".to_string(), "20".to_string()),
        ]
    );

    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_references_are_stale_after_resume() {
    let program = Program::new(ADD);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[2]);
    client.configuration_done();
    client.wait_event("stopped");

    let (frame_id, ..) = top_frame(&client.stack_trace());
    let scopes = client.scopes(frame_id);
    let local_reference = scopes["body"]["scopes"][0]["variablesReference"].as_i64().unwrap();
    assert!(!variable_pairs(&client.variables(local_reference)).is_empty());

    client.resume("next");
    client.wait_event("stopped");

    let stale = client.variables(local_reference);
    assert_eq!(stale["success"], true);
    assert!(stale["body"]["variables"].as_array().unwrap().is_empty());

    let unknown = client.variables(9999);
    assert_eq!(unknown["success"], true);
    assert!(unknown["body"]["variables"].as_array().unwrap().is_empty());

    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_deep_stack_is_bounded_and_paged() {
    let program = Program::new(
        "function down(n) {\n  if (n === 0) {\n    return 0;\n  }\n  return down(n - 1);\n}\ndown(15);\n",
    );
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[3]);
    client.configuration_done();
    client.wait_event("stopped");

    let stack_trace = client.stack_trace();
    assert_eq!(stack_trace["body"]["stackFrames"].as_array().unwrap().len(), 10);
    assert_eq!(stack_trace["body"]["totalFrames"], 10);

    let page = client.request("stackTrace", Some(json!({"threadId": 1, "startFrame": 8, "levels": 5})));
    let ids = page["body"]["stackFrames"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_i64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![9, 10]);

    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_evaluate_while_paused() {
    let program = Program::new(ADD);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[3]);
    client.configuration_done();
    client.wait_event("stopped");

    let (frame_id, ..) = top_frame(&client.stack_trace());
    let result = client.evaluate("a * 10 + b", Some(frame_id));
    assert_eq!(result["body"]["result"], "12");
    assert_eq!(result["body"]["type"], "number");

    let caller = client.evaluate("typeof a", Some(frame_id + 1));
    assert_eq!(caller["body"]["result"], "\"undefined\"");

    let failure = client.evaluate("missing + 1", Some(frame_id));
    assert_eq!(failure["success"], false);
    assert!(!failure["message"].as_str().unwrap().is_empty());

    // Still paused: the session answers and the program finishes normally.
    assert_eq!(client.request("threads", None)["body"]["threads"][0]["name"], "main");
    client.resume("continue");
    let events = client.events_until("terminated");
    assert_eq!(event_names(&events), vec!["output", "exited", "terminated"]);

    client.finish();
}

#[test]
fn test_evaluate_globally() {
    let mut client = TestClient::start();
    client.initialize();

    let result = client.evaluate("1+1", None);
    assert_eq!(result["success"], true);
    assert_eq!(result["body"]["result"], "2");
    assert_eq!(result["body"]["type"], "number");

    let failure = client.evaluate("undeclared", None);
    assert_eq!(failure["success"], false);
    assert!(!failure["message"].as_str().unwrap().is_empty());

    client.finish();
}

#[test]
fn test_continue_without_pause_does_not_skip_breakpoint() {
    let program = Program::new(ASSIGNMENTS);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[3]);
    assert_eq!(client.resume("continue")["success"], true);
    client.configuration_done();

    assert_eq!(client.wait_event("stopped")["body"]["reason"], "breakpoint");
    client.resume("continue");
    client.wait_event("terminated");
    client.finish();
}

#[test]
fn test_pause_running_program() {
    let program = Program::new("var n = 0;\nwhile (true) {\n  n = n + 1;\n}\n");
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.configuration_done();

    assert_eq!(client.resume("pause")["success"], true);
    let stopped = client.wait_event("stopped");
    assert_eq!(stopped["body"]["reason"], "pause");

    let (frame_id, ..) = top_frame(&client.stack_trace());
    assert_eq!(client.evaluate("n >= 0", Some(frame_id))["body"]["result"], "true");

    assert_eq!(client.request("disconnect", None)["success"], true);
    client.join();
}

#[rstest]
#[case::next("next")]
#[case::step_out("stepOut")]
fn test_pause_inside_stepped_over_call(#[case] command: &str) {
    let program = Program::new("function spin() {\n  var n = 0;\n  while (true) {\n    n = n + 1;\n  }\n}\nspin();\n");
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({"stopOnEntry": true}));
    client.configuration_done();
    assert_eq!(client.wait_event("stopped")["body"]["reason"], "step");
    assert_eq!(top_frame(&client.stack_trace()).2, 7);

    client.resume(command);
    assert_eq!(client.resume("pause")["success"], true);
    let stopped = client.wait_event("stopped");
    assert_eq!(stopped["body"]["reason"], "pause");

    let stack_trace = client.stack_trace();
    assert_eq!(top_frame(&stack_trace).1, "spin");
    assert_eq!(stack_trace["body"]["totalFrames"], 2);

    assert_eq!(client.request("disconnect", None)["success"], true);
    client.join();
}

#[test]
fn test_no_debug_ignores_breakpoints() {
    let program = Program::new(ASSIGNMENTS);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({"noDebug": true}));
    client.set_breakpoints(program.path(), &[3]);
    client.configuration_done();

    let events = client.events_until("terminated");
    assert_eq!(event_names(&events), vec!["output", "exited", "terminated"]);

    client.finish();
}

#[test]
fn test_duplicate_configuration_done_runs_once() {
    let program = Program::new("console.log(\"once\");\n");
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.configuration_done();
    assert_eq!(client.configuration_done()["success"], true);

    let events = client.events_until("terminated");
    assert_eq!(event_names(&events), vec!["output", "exited", "terminated"]);

    // Anything a second run would have produced arrives before this response.
    client.request("threads", None);
    client.request("threads", None);
    client.finish();
}

#[test]
fn test_launch_failure_keeps_session() {
    let mut client = TestClient::start();
    client.initialize();

    let response = client.request("launch", Some(json!({"program": "/no/such/program.js"})));
    assert_eq!(response["success"], false);
    assert!(response["message"].as_str().unwrap().contains("/no/such/program.js"));

    assert_eq!(client.configuration_done()["success"], true);
    assert_eq!(client.request("threads", None)["success"], true);
    client.finish();
}

#[test]
fn test_unknown_command_keeps_session() {
    let mut client = TestClient::start();
    client.initialize();

    let response = client.request("stepBack", Some(json!({"threadId": 1})));
    assert_eq!(response["success"], false);
    assert!(response["message"].as_str().unwrap().contains("stepBack"));
    assert!(response.get("body").is_none());

    assert_eq!(client.request("threads", None)["success"], true);
    client.finish();
}

#[test]
fn test_malformed_frames_are_dropped() {
    let mut client = TestClient::start();

    client.send_raw(b"Content-Length: 9\r\n\r\n{garbage}");
    client.send_raw(b"Content-Length: lots\r\n\r\n");
    let response = client.request("threads", None);

    assert_eq!(response["success"], true);
    assert_eq!(response["seq"], 1);
    client.finish();
}

#[test]
fn test_terminate_ends_session() {
    let mut client = TestClient::start();
    client.initialize();

    let response = client.request("terminate", None);
    assert_eq!(response["success"], true);
    assert_eq!(client.next_event()["event"], "terminated");
    client.join();
}

#[test]
fn test_sequence_numbers_strictly_increase() {
    let program = Program::new(ASSIGNMENTS);
    let mut client = TestClient::start();

    client.initialize();
    client.launch(&program, json!({}));
    client.set_breakpoints(program.path(), &[2]);
    client.configuration_done();
    client.wait_event("stopped");
    client.stack_trace();
    client.resume("continue");
    client.wait_event("terminated");
    client.request("disconnect", None);

    let seqs = client.received_seqs().to_vec();
    assert_eq!(seqs.first(), Some(&1));
    assert!(seqs.windows(2).all(|pair| pair[1] == pair[0] + 1), "{:?}", seqs);
    client.join();
}
