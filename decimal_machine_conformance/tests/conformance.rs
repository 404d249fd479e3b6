// Copyright 2026 the Decimal Machine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(missing_docs, reason = "integration test crate")]

use std::sync::Arc;

use decimal_machine::opcode::Opcode;
use decimal_machine::program::{Program, ProgramError};
use decimal_machine::vm::{Fault, Machine, VarValue, ARENA_SIZE, STACK_SIZE};

fn program(src: &str) -> Arc<Program> {
    Arc::new(Program::parse(src).unwrap())
}

fn machine(src: &str) -> Machine {
    Machine::new(program(src))
}

/// Runs `operand` through a one-operand instruction and returns `result`.
fn run_unop(instruction: &str, operand: &str) -> String {
    let src = format!("operand|result;;Lv0{instruction}St1Xx");
    let mut m = machine(&src);
    m.set("operand", operand).unwrap();
    assert_eq!(m.run().unwrap(), 4);
    m.get("result").unwrap()
}

/// Runs two operands through a binary instruction and returns `result`.
fn run_binop(instruction: &str, a: &str, b: &str) -> String {
    let src = format!("operand1|operand2|result;;Lv0Lv1{instruction}St2Xx");
    let mut m = machine(&src);
    m.set("operand1", a).unwrap();
    m.set("operand2", b).unwrap();
    assert_eq!(m.run().unwrap(), 5);
    m.get("result").unwrap()
}

// ── Program construction ────────────────────────────────────────────

#[test]
fn program_requires_three_sections() {
    for src in ["", "foo", ";123"] {
        let err = Program::parse(src).unwrap_err();
        assert_eq!(
            err.to_string(),
            "program must have variables, constants, and instructions sections",
            "{src:?}"
        );
    }
}

#[test]
fn program_rejects_bad_names_and_constants() {
    assert_eq!(
        Program::parse("|bar;;Xx").unwrap_err().to_string(),
        "invalid variable name \"\""
    );
    assert_eq!(
        Program::parse("foo|foo;;Xx").unwrap_err().to_string(),
        "duplicate variable name \"foo\""
    );
    for v in ["NaN", "Inf", "Infinity", "-Inf", "-Infinity", "bogus"] {
        assert_eq!(
            Program::parse(&format!(";{v};Xx")).unwrap_err().to_string(),
            format!("invalid constant value \"{v}\"")
        );
    }
}

#[test]
fn program_rejects_bad_instructions() {
    for (src, name) in [
        (";;?", "?"),
        (";;XX", "X"),
        (";;X0", "X"),
        (";;Xy", "Xy"),
        (";;0", "0"),
    ] {
        assert_eq!(
            Program::parse(src).unwrap_err(),
            ProgramError::InvalidInstruction(name.into()),
            "{src:?}"
        );
    }
    assert_eq!(
        Program::parse(";;Ju65536Xx").unwrap_err().to_string(),
        "instruction parameter is too large"
    );
}

#[test]
fn program_checks_slot_references_at_parse_time() {
    assert_eq!(
        Program::parse(";;Lc0Xx").unwrap_err().to_string(),
        "reference to nonexistent constant slot 0"
    );
    assert_eq!(
        Program::parse(";100|200|300;Lc123Xx").unwrap_err().to_string(),
        "reference to nonexistent constant slot 123"
    );
    assert_eq!(
        Program::parse("a;;Lv1Xx").unwrap_err().to_string(),
        "reference to nonexistent variable slot 1"
    );
}

#[test]
fn program_serialization_round_trips() {
    let src = "x|y;3.14|42;Lv0CpMlLc0MlSt1Lc1St0Xx";
    let p = Program::parse(src).unwrap();
    assert_eq!(p.source(), src);
    let q = Program::parse(p.source()).unwrap();
    assert_eq!(q.instructions(), p.instructions());
    assert_eq!(
        q.variable_names().collect::<Vec<_>>(),
        p.variable_names().collect::<Vec<_>>()
    );
    assert_eq!(q.constant_count(), p.constant_count());
}

#[test]
fn parsable_constants_run() {
    let mut m = machine(";0|-0|1|-1|0.3|3.13159|-100000000.0000000001;Xx");
    assert_eq!(m.run().unwrap(), 1);
}

// ── End-to-end scenarios ────────────────────────────────────────────

#[test]
fn scenario_minimal_program() {
    let mut m = machine(";;Xx");
    assert_eq!(m.run().unwrap(), 1);
    assert_eq!(m.variable_count(), 0);
}

#[test]
fn scenario_circle_area() {
    let p = program("x|y;3.14;Lv0CpMlLc0MlSt1Xx");
    let mut m = Machine::with_baseline(p, [("x", 2)]).unwrap();
    assert_eq!(m.run().unwrap(), 7);
    assert_eq!(m.get("y").unwrap(), "12.56");
}

#[test]
fn scenario_division_by_zero_carries_site() {
    let mut m = machine(";;LoLzDvXx");
    let err = m.run().unwrap_err();
    assert_eq!(err.opcode, Some(Opcode::Divide));
    assert_eq!(err.instruction, 2);
    assert_eq!(err.fault, Fault::DivisionByZero);
    assert_eq!(err.to_string(), "illegal Dv at instruction 2");
}

#[test]
fn scenario_pc_runs_off_the_end() {
    // Parses fine; the pc advances past the last instruction at run time.
    let mut m = machine("p;;Lv0Lz");
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::OutOfBounds);
    assert_eq!(err.instruction, 2);
    assert_eq!(
        err.to_string(),
        "current execution location 2 is out-of-bounds"
    );

    let mut m = machine(";;Ju2Xx");
    let err = m.run().unwrap_err();
    assert_eq!(err.to_string(), "current execution location 2 is out-of-bounds");
}

#[test]
fn scenario_arena_exhaustion() {
    // A Fibonacci chain keeps ~1000 distinct values live in variables,
    // far beyond the 256 arena cells.
    let names: Vec<String> = (0..1000).map(|i| format!("v{i}")).collect();
    let mut src = names.join("|");
    src.push_str(";;LoSt0LoSt1");
    for i in 0..998 {
        src.push_str(&format!("Lv{}Lv{}AdSt{}", i, i + 1, i + 2));
    }
    src.push_str("Xx");
    let mut m = machine(&src);
    m.set_instruction_limit(100_000);
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::OutOfSpace);
    assert_eq!(err.to_string(), "ran out of space");
    // The machine stays usable.
    m.reset();
    assert_eq!(m.get("v0").unwrap(), "0");
}

#[test]
fn scenario_instruction_limit_counts_exactly() {
    let mut m = machine(";;Ju0");
    m.set_instruction_limit(3);
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::InstructionLimitExceeded { executed: 3 });
    assert_eq!(
        err.to_string(),
        "execution forcibly terminated after 3 instructions"
    );
}

#[test]
fn gc_pressure_still_computes_the_right_answer() {
    // Every iteration allocates transient cells; sweeps must never reclaim
    // the live accumulator.
    let mut src = String::from("acc;1.25;");
    for _ in 0..800 {
        src.push_str("Lv0Lc0AdSt0");
    }
    src.push_str("Xx");
    let mut m = machine(&src);
    assert!(ARENA_SIZE < 800);
    m.run().unwrap();
    assert_eq!(m.get("acc").unwrap(), "1000");
}

// ── Resource bounds ─────────────────────────────────────────────────

#[test]
fn stack_overflow_message() {
    let src = format!(";;{}Xx", "Lz".repeat(8000));
    let mut m = machine(&src);
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::StackOverflow);
    assert_eq!(err.instruction, STACK_SIZE);
    assert_eq!(err.to_string(), "ran out of stack");
}

#[test]
fn operand_underflow_message() {
    let mut m = machine("a;;St0Xx");
    let err = m.run().unwrap_err();
    assert_eq!(
        err.to_string(),
        "instruction \"St\" requires 1 operand(s), but the stack only has 0"
    );
    let mut m = machine(";;LzAdXx");
    let err = m.run().unwrap_err();
    assert_eq!(
        err.to_string(),
        "instruction \"Ad\" requires 2 operand(s), but the stack only has 1"
    );
}

// ── Host variable access ────────────────────────────────────────────

#[test]
fn variables_read_back_canonically() {
    let mut m = machine("a;;Xx");
    for (input, expected) in [
        ("0", "0"),
        ("-0", "0"),
        ("0.000000", "0"),
        ("1.000000", "1"),
        ("00042", "42"),
        ("3.14159", "3.14159"),
        ("-0.50", "-0.5"),
        (".5", "0.5"),
    ] {
        m.set("a", input).unwrap();
        assert_eq!(m.get("a").unwrap(), expected, "{input:?}");
    }
    m.set("a", i64::MAX).unwrap();
    assert_eq!(m.get("a").unwrap(), "9223372036854775807");
    m.set("a", true).unwrap();
    assert_eq!(m.get("a").unwrap(), "1");
}

#[test]
fn baseline_is_stable_under_sets_and_resets() {
    let p = program("a|b|c;;Xx");
    let baseline = [("a", VarValue::from("1.5")), ("b", VarValue::from(2))];
    let mut m = Machine::with_baseline(p, baseline).unwrap();
    for round in 0..5 {
        m.set("a", round).unwrap();
        m.set("c", "99.9").unwrap();
        m.reset();
        assert_eq!(m.get("a").unwrap(), "1.5");
        assert_eq!(m.get("b").unwrap(), "2");
        assert_eq!(m.get("c").unwrap(), "0");
    }
}

#[test]
fn errors_leave_completed_assignments() {
    let mut m = machine("a|b;;LoSt0LoLzDvSt1Xx");
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::DivisionByZero);
    // The St0 before the fault stuck; b was never written.
    assert_eq!(m.get("a").unwrap(), "1");
    assert_eq!(m.get("b").unwrap(), "0");
    m.reset();
    assert_eq!(m.get("a").unwrap(), "0");
}

// ── Opcode behavior tables ──────────────────────────────────────────

#[test]
fn opcode_nt() {
    for (a, expected) in [
        ("0", "1"),
        ("0.000000", "1"),
        ("-0", "1"),
        ("-0.0", "1"),
        ("1", "0"),
        ("1.000000", "0"),
        ("42.001", "0"),
        ("-42.001", "0"),
    ] {
        assert_eq!(run_unop("Nt", a), expected, "Nt {a}");
    }
}

#[test]
fn opcode_ng_ab() {
    for (a, expected) in [("0", "0"), ("1", "-1"), ("42.001", "-42.001"), ("-42.001", "42.001")] {
        assert_eq!(run_unop("Ng", a), expected, "Ng {a}");
    }
    for (a, expected) in [("0", "0"), ("1", "1"), ("42.001", "42.001"), ("-42.001", "42.001")] {
        assert_eq!(run_unop("Ab", a), expected, "Ab {a}");
    }
}

#[test]
fn opcode_cl_fl_rd() {
    for (a, expected) in [("0", "0"), ("1", "1"), ("42.001", "43"), ("-42.001", "-42")] {
        assert_eq!(run_unop("Cl", a), expected, "Cl {a}");
    }
    for (a, expected) in [("0", "0"), ("1", "1"), ("42.001", "42"), ("-42.001", "-43")] {
        assert_eq!(run_unop("Fl", a), expected, "Fl {a}");
    }
    for (a, expected) in [
        ("0", "0"),
        ("1", "1"),
        ("42.001", "42"),
        ("-42.001", "-42"),
        ("0.5", "0"),
        ("1.5", "2"),
        ("2.5", "2"),
    ] {
        assert_eq!(run_unop("Rd", a), expected, "Rd {a}");
    }
}

#[test]
fn opcode_comparisons() {
    let table = [
        // a, b, eq, ne, gt, ge
        ("0", "0", "1", "0", "0", "1"),
        ("0.000000", "0", "1", "0", "0", "1"),
        ("-0.0", "0", "1", "0", "0", "1"),
        ("1", "1", "1", "0", "0", "1"),
        ("1.000000", "1", "1", "0", "0", "1"),
        ("42.001", "42", "0", "1", "1", "1"),
        ("-42.001", "-42", "0", "1", "0", "0"),
    ];
    for (a, b, eq, ne, gt, ge) in table {
        assert_eq!(run_binop("Eq", a, b), eq, "Eq {a} {b}");
        assert_eq!(run_binop("Ne", a, b), ne, "Ne {a} {b}");
        assert_eq!(run_binop("Gt", a, b), gt, "Gt {a} {b}");
        assert_eq!(run_binop("Ge", a, b), ge, "Ge {a} {b}");
    }
}

#[test]
fn opcode_ad_sb_ml() {
    for (a, b, expected) in [
        ("0", "0", "0"),
        ("1", "1", "2"),
        ("42.001", "42", "84.001"),
        ("-42.001", "-42", "-84.001"),
    ] {
        assert_eq!(run_binop("Ad", a, b), expected, "Ad {a} {b}");
    }
    for (a, b, expected) in [
        ("0", "0", "0"),
        ("1", "1", "0"),
        ("42.001", "42", "0.001"),
        ("-42.001", "-42", "-0.001"),
    ] {
        assert_eq!(run_binop("Sb", a, b), expected, "Sb {a} {b}");
    }
    for (a, b, expected) in [
        ("0", "0", "0"),
        ("1", "1", "1"),
        ("42.001", "42", "1764.042"),
        ("-42.001", "-42", "1764.042"),
    ] {
        assert_eq!(run_binop("Ml", a, b), expected, "Ml {a} {b}");
    }
}

#[test]
fn opcode_dv() {
    assert_eq!(run_binop("Dv", "5", "5"), "1");
    assert_eq!(run_binop("Dv", "1.000000", "1"), "1");
    assert_eq!(
        run_binop("Dv", "42.001", "42"),
        "1.00002380952380952380952380952381"
    );
    assert_eq!(
        run_binop("Dv", "-42.001", "-42"),
        "1.00002380952380952380952380952381"
    );

    for src in [";0;Lc0CpDvXx", ";5|0;Lc0Lc1DvXx", ";5.00000|0.000000;Lc0Lc1DvXx", ";5|-0;Lc0Lc1DvXx"] {
        let mut m = machine(src);
        let err = m.run().unwrap_err();
        assert_eq!(err.to_string(), "illegal Dv at instruction 2", "{src:?}");
        assert_eq!(err.instruction, 2);
        assert_eq!(err.opcode.map(Opcode::mnemonic), Some("Dv"));
    }
}

#[test]
fn opcode_pw() {
    let mut m = machine(";0;Lc0CpPwXx");
    assert_eq!(m.run().unwrap(), 4); // 0 ^ 0 = 0

    assert_eq!(run_binop("Pw", "9", "0.5"), "3");
    assert_eq!(run_binop("Pw", "2", "3"), "8");
    assert_eq!(run_binop("Pw", "1.000000", "1"), "1");
    assert_eq!(run_binop("Pw", "2", "-1"), "0.5");

    let src = "x|y;;Lv0Lv1PwXx";
    let mut m = machine(src);
    m.set("x", "0").unwrap();
    m.set("y", "-2").unwrap();
    let err = m.run().unwrap_err();
    assert_eq!(err.to_string(), "illegal Pw at instruction 2");
}

#[test]
fn opcode_mn_mx() {
    for (a, b, expected) in [
        ("0", "0", "0"),
        ("1", "1", "1"),
        ("42.001", "42", "42"),
        ("-42.001", "-42", "-42.001"),
    ] {
        assert_eq!(run_binop("Mn", a, b), expected, "Mn {a} {b}");
    }
    for (a, b, expected) in [
        ("0", "0", "0"),
        ("1", "1", "1"),
        ("42.001", "42", "42.001"),
        ("-42.001", "-42", "-42"),
    ] {
        assert_eq!(run_binop("Mx", a, b), expected, "Mx {a} {b}");
    }
}

#[test]
fn fast_path_and_decimal_paths_agree() {
    // Integers beyond the i32 fast path force the decimal route; the
    // results must agree with ordinary integer arithmetic.
    assert_eq!(run_binop("Ad", "9999999999", "1"), "10000000000");
    assert_eq!(run_binop("Sb", "9999999999", "10000000000"), "-1");
    assert_eq!(run_binop("Ml", "3037000499", "3037000499"), "9223372030926249001");
    assert_eq!(run_binop("Gt", "9999999999", "9999999998"), "1");
    assert_eq!(run_binop("Eq", "9999999999", "9999999999.000"), "1");
    assert_eq!(run_binop("Mn", "-9999999999", "1"), "-9999999999");
    // Fast-path i64 products that leave the i32 range keep exact decimals.
    assert_eq!(run_binop("Ml", "2000000000", "2000000000"), "4000000000000000000");
    // i32 boundary negation goes through the wide path.
    assert_eq!(run_unop("Ng", "-2147483648"), "2147483648");
}

// ── Random values ───────────────────────────────────────────────────

#[test]
fn random_values_are_consumed_in_order() {
    let mut m = machine("a|b|c|d;;LrSt0LrSt1LrSt2LrSt3Xx");
    assert_eq!(m.run().unwrap(), 9);
    for name in ["a", "b", "c", "d"] {
        assert_eq!(m.get(name).unwrap(), "0");
    }

    let mut cycle = ["0.5", "3.14"].iter().cycle();
    m.set_random_source(move || cycle.next().map(|s| VarValue::from(*s)));
    assert_eq!(m.run().unwrap(), 9);
    assert_eq!(m.get("a").unwrap(), "0.5");
    assert_eq!(m.get("b").unwrap(), "3.14");
    assert_eq!(m.get("c").unwrap(), "0.5");
    assert_eq!(m.get("d").unwrap(), "3.14");

    let mut short = ["1"].iter().map(|s| VarValue::from(*s)).collect::<Vec<_>>().into_iter();
    m.set_random_source(move || short.next());
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::RandomExhausted);
}

// ── Coverage ────────────────────────────────────────────────────────

#[test]
fn coverage_reflects_branches_taken() {
    let p = program("a|b;42;Lv0Jn4Lc0St1Xx");
    let mut m = Machine::with_baseline(p, [("a", 1)]).unwrap();
    let bits = m.run_with_coverage().unwrap();
    assert_eq!(bits, vec![true, true, false, false, true]);

    m.reset_with([("a", 0)]).unwrap();
    let bits = m.run_with_coverage().unwrap();
    assert_eq!(bits, vec![true, true, true, true, true]);
}

#[test]
fn coverage_counts_match_plain_runs() {
    let p = program("x|y;3.14;Lv0CpMlLc0MlSt1Xx");
    let mut m = Machine::with_baseline(p, [("x", 2)]).unwrap();
    let bits = m.run_with_coverage().unwrap();
    assert_eq!(bits.len(), 7);
    assert!(bits.iter().all(|&b| b));
    assert_eq!(m.get("y").unwrap(), "12.56");
    assert_eq!(m.run().unwrap(), 7);
}

#[test]
fn coverage_is_discarded_on_failure() {
    let mut m = machine(";;LoLzDvXx");
    assert!(m.run_with_coverage().is_err());
}

// ── A larger program exercising every opcode ────────────────────────

#[test]
fn stress_all_opcodes() {
    let src = concat!(
        "x|y|not|neg|abs|ceil|flr|rnd|eq|ne|gt|ge|sum|diff|prod|quot|exp|min|max|rand|zero|one|two;2;",
        "Lv0", "Nt", "St2",
        "Lv0", "Ng", "St3",
        "Lv0", "Ab", "St4",
        "Lv0", "Cl", "St5",
        "Lv0", "Fl", "St6",
        "Lv0", "Rd", "St7",
        "Lv0", "Lv1", "Eq", "St8",
        "Lv0", "Lv1", "Ne", "St9",
        "Lv0", "Lv1", "Gt", "St10",
        "Lv0", "Lv1", "Ge", "St11",
        "Lv0", "Lv1", "Ad", "St12",
        "Lv0", "Lv1", "Sb", "St13",
        "Lv0", "Lv1", "Ml", "St14",
        "Lv1", "Jz52", "Lv0", "Lv1",
        "Dv", "Ju53", "Lz", "St15",
        "Lz", "Cp", "Lv0", "Eq", "Jn68",
        "Cp", "Lv1", "Eq", "Jn68",
        "Pp", "Lv0", "Lv1", "Pw",
        "St16",
        "Lv0", "Lv1", "Mn", "St17",
        "Lv0", "Lv1", "Mx", "St18",
        "Lr", "St19",
        "Lz", "St20",
        "Lo", "St21",
        "Lc0", "St22",
        "Xx",
    );
    let p = program(src);
    for (x, y) in [(0i32, 0i32), (1, 0), (0, 1), (1, 1), (3, 2)] {
        let mut m = Machine::with_baseline(Arc::clone(&p), [("x", x), ("y", y)]).unwrap();
        m.run().unwrap();
        assert_eq!(m.get("not").unwrap(), if x == 0 { "1" } else { "0" });
        assert_eq!(m.get("neg").unwrap(), (-x).to_string());
        assert_eq!(m.get("abs").unwrap(), x.abs().to_string());
        assert_eq!(m.get("ceil").unwrap(), x.to_string());
        assert_eq!(m.get("sum").unwrap(), (x + y).to_string());
        assert_eq!(m.get("diff").unwrap(), (x - y).to_string());
        assert_eq!(m.get("prod").unwrap(), (x * y).to_string());
        let quot = if y == 0 {
            "0".to_string()
        } else if x % y == 0 {
            (x / y).to_string()
        } else {
            "1.5".to_string()
        };
        assert_eq!(m.get("quot").unwrap(), quot, "x={x} y={y}");
        let exp = if x == 0 || y == 0 {
            "0".to_string()
        } else {
            x.pow(y as u32).to_string()
        };
        assert_eq!(m.get("exp").unwrap(), exp, "x={x} y={y}");
        assert_eq!(m.get("min").unwrap(), x.min(y).to_string());
        assert_eq!(m.get("max").unwrap(), x.max(y).to_string());
        assert_eq!(m.get("zero").unwrap(), "0");
        assert_eq!(m.get("one").unwrap(), "1");
        assert_eq!(m.get("two").unwrap(), "2");
    }
}

// ── Overflow surfaces ───────────────────────────────────────────────

#[test]
fn overflow_reports_result_too_large() {
    let big = format!("1{}", "0".repeat(6144));
    let src = format!(";{big}|10;Lc0Lc1MlXx");
    let mut m = machine(&src);
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::Overflow);
    assert_eq!(err.to_string(), "result of Ml at instruction 2 was too large");
}

#[test]
fn underflow_reports_result_too_small() {
    let tiny = format!("0.{}1", "0".repeat(6175));
    let src = format!(";{tiny}|3;Lc0Lc1DvXx");
    let mut m = machine(&src);
    let err = m.run().unwrap_err();
    assert_eq!(err.fault, Fault::Underflow);
    assert_eq!(err.to_string(), "result of Dv at instruction 2 was too small");
}
