use std::path::PathBuf;

use perfscript::domain::{CpuId, Pid, Tid};
use perfscript::parsing::EventParser;
use perfscript::trace_data::{EventKind, LinuxEvent};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn parse_fixture(name: &str) -> Vec<LinuxEvent> {
    let bytes = std::fs::read(fixture(name)).expect("Failed to read fixture");
    EventParser::from_bytes(bytes).collect()
}

fn frame_names(event: &LinuxEvent) -> Vec<String> {
    event.frames.iter().map(|frame| frame.display_key()).collect()
}

fn assert_time(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "time {actual} != {expected}");
}

#[test]
fn test_one_generic_record() {
    let events = parse_fixture("onegeneric.data.txt");
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.command, "comm");
    assert_eq!(event.pid, Pid(0));
    assert_eq!(event.tid, Tid(0));
    assert_eq!(event.cpu, CpuId(0));
    assert_time(event.time, 0.0);
    assert_eq!(event.time_property, 1);
    assert_eq!(event.event_name, "event_name");
    assert_eq!(event.event_details, "event_properties");
    assert_eq!(event.kind, EventKind::Cpu);
    assert_eq!(frame_names(event), vec!["module!symbol", "Thread (0)", "comm"]);
}

#[test]
fn test_two_records_with_shared_frame() {
    let events = parse_fixture("two_small_generic.data.txt");
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].command, "comm");
    assert_eq!(
        frame_names(&events[0]),
        vec!["module!symbol", "module2!symbol2", "main!main", "Thread (0)", "comm"]
    );

    assert_eq!(events[1].command, "comm2");
    assert_time(events[1].time, 1.0);
    assert_eq!(
        frame_names(&events[1]),
        vec!["module3!symbol3", "module4!symbol4", "main!main", "Thread (0)", "comm2"]
    );
}

#[test]
fn test_symbol_with_parenthesised_signature() {
    let events = parse_fixture("ms_stack.data.txt");
    assert_eq!(events.len(), 1);
    assert_eq!(frame_names(&events[0]), vec!["module!symbol(param[])", "Thread (0)", "comm"]);
}

#[test]
fn test_record_without_frames() {
    let events = parse_fixture("no_stack_frames.data.txt");
    assert_eq!(events.len(), 2);
    assert_eq!(frame_names(&events[0]), vec!["Thread (0)", "comm"]);
    assert_eq!(events[0].code_frame_count(), 0);
    assert_eq!(frame_names(&events[1]), vec!["module!symbol", "Thread (0)", "comm"]);
}

#[test]
fn test_command_with_spaces_and_digits() {
    let events = parse_fixture("space_sep_command.data.txt");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].command, "comm and3 another part to the command line5 part3 part1");
    assert_eq!(events[0].pid, Pid(0));
    assert_eq!(events[0].time_property, 1);
    assert_eq!(events[0].event_name, "event_name");
}

#[test]
fn test_schedule_switch_records() {
    let events = parse_fixture("one_complete_switch.data.txt");
    assert_eq!(events.len(), 2);

    let first = &events[0];
    assert_eq!(first.kind, EventKind::Scheduler);
    assert_eq!(first.command, "comm1");
    assert_eq!(first.cpu, CpuId(0));
    assert_eq!(first.time_property, 1);
    assert_eq!(first.event_name, "sched");
    assert_eq!(
        first.event_details,
        "sched_switch: prev_comm=comm1 prev_pid=0 prev_prio=0 prev_state=S ==> next_comm=comm2 next_pid=1 next_prio=1"
    );
    let switch = first.schedule_switch.as_ref().expect("switch payload");
    assert_eq!(switch.prev_command, "comm1");
    assert_eq!(switch.prev_tid, 0);
    assert_eq!(switch.prev_priority, 0);
    assert_eq!(switch.prev_state, 'S');
    assert_eq!(switch.next_command, "comm2");
    assert_eq!(switch.next_tid, 1);
    assert_eq!(switch.next_priority, 1);
    assert_eq!(frame_names(first), vec!["module!symbol", "Thread (0)", "comm1"]);

    let second = &events[1];
    assert_eq!(second.command, "comm2");
    assert_eq!(second.pid, Pid(1));
    assert_eq!(second.tid, Tid(1));
    assert_eq!(second.cpu, CpuId(1));
    assert_time(second.time, 1.0);
    let switch = second.schedule_switch.as_ref().expect("switch payload");
    assert_eq!(switch.prev_tid, 1);
    assert_eq!(switch.next_command, "comm1");
    assert_eq!(switch.next_tid, 0);
}

#[test]
fn test_realistic_frames() {
    let events = parse_fixture("mixed_events.data.txt");
    assert_eq!(events.len(), 4);

    let first = &events[0];
    assert_eq!(first.pid, Pid(100));
    assert_eq!(first.tid, Tid(101));
    assert_eq!(first.cpu, CpuId(2));
    assert_eq!(first.time_property, 250_000);
    assert_eq!(first.event_name, "cycles");
    assert_eq!(
        frame_names(first),
        vec![
            "kernel.kallsyms!do_syscall_64",
            "libc.so.6!__libc_read+0x10",
            "app!main",
            "Thread (101)",
            "app",
        ]
    );

    // JIT frames resolved through a perf map carry their own module
    assert_eq!(
        frame_names(&events[1]),
        vec!["System.Private.CoreLib.dll!System.String::Concat", "app!main", "Thread (102)", "app"]
    );

    assert_eq!(events[2].kind, EventKind::Scheduler);
    let switch = events[2].schedule_switch.as_ref().expect("switch payload");
    assert_eq!(switch.next_command, "swapper/2");
    assert_eq!(switch.next_tid, 0);
}

#[test]
fn test_filter_keeps_matching_events() {
    let bytes = std::fs::read(fixture("mixed_events.data.txt")).expect("Failed to read fixture");
    let filter = regex::Regex::new("^cycles$").expect("valid regex");
    let mut parser = EventParser::from_bytes(bytes).with_filter(Some(filter));

    let events: Vec<LinuxEvent> = parser.by_ref().collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.kind == EventKind::Cpu));

    let stats = parser.stats();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.filtered, 1);
}
