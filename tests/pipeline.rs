//! End-to-end pipeline tests at the text level: source programs go through
//! the whole compile and the generated assembly/C is inspected. No external
//! assembler is invoked.

use calcc::{
    CompileOptions, compile,
    backend::Target,
    frontend::SourceFile,
};
use strum::IntoEnumIterator;

fn compile_to(src: &str, target: Target) -> String {
    let source = SourceFile::from_string(src);
    compile(
        &source,
        &CompileOptions {
            target,
            fold: true,
        },
    )
    .unwrap_or_else(|errors| panic!("program should compile, got {errors:?}: {src}"))
}

struct Scenario {
    source: &'static str,
    /// Constant the program prints, when it survives to the output text
    folded_constant: Option<&'static str>,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        source: "(define main (func:int 42))",
        folded_constant: Some("42"),
    },
    Scenario {
        source: "(define main (func:int (+ 5 3)))",
        folded_constant: Some("8"),
    },
    Scenario {
        source: "(define fn (func (a:int b:int):int (+ a b)))\
                 (define main (func:int (fn 1 2)))",
        folded_constant: None,
    },
    Scenario {
        source: "(define main (func:int (if true :int 99)))",
        folded_constant: Some("99"),
    },
    Scenario {
        source: "(define main (func:int (if false :int 2 3)))",
        folded_constant: None,
    },
    Scenario {
        source: "(define main (func:int (var (a:int):int (= a 42) a)))",
        folded_constant: Some("42"),
    },
    Scenario {
        source: "(define main (func:int -24))",
        folded_constant: Some("-24"),
    },
];

#[test]
fn scenarios_compile_on_every_target() {
    for scenario in SCENARIOS {
        for target in Target::iter() {
            let out = compile_to(scenario.source, target);
            assert!(!out.is_empty(), "{target}: {}", scenario.source);
        }
    }
}

#[test]
fn folded_constants_reach_the_assembly() {
    for scenario in SCENARIOS {
        let Some(constant) = scenario.folded_constant else {
            continue;
        };
        let asm = compile_to(scenario.source, Target::X86_64Linux);
        assert!(
            asm.contains(&format!("movl ${constant}, ")),
            "expected {constant} in output for {}",
            scenario.source
        );
    }
}

#[test]
fn compilation_is_deterministic() {
    for scenario in SCENARIOS {
        for target in Target::iter() {
            assert_eq!(
                compile_to(scenario.source, target),
                compile_to(scenario.source, target),
                "{target}: {}",
                scenario.source
            );
        }
    }
}

#[test]
fn every_assembly_target_emits_the_entry_trampoline() {
    let src = "(define main (func:int 42))";

    let linux = compile_to(src, Target::X86_64Linux);
    assert!(linux.contains("movslq %eax, %rsi"));
    assert!(linux.contains("callq printf"));

    let windows = compile_to(src, Target::X86_64Windows);
    assert!(windows.contains("subq $32, %rsp"));
    assert!(windows.contains("movslq %eax, %rdx"));

    let posix32 = compile_to(src, Target::X86_32);
    assert!(posix32.contains("movl %eax, 4(%esp)"));
    assert!(posix32.contains("call printf"));
}

#[test]
fn functions_are_global_and_underscore_prefixed() {
    let src = "(define fn (func (a:int b:int):int (+ a b)))\
               (define main (func:int (fn 1 2)))";
    let asm = compile_to(src, Target::X86_64Linux);

    assert!(asm.contains(".global _fn"));
    assert!(asm.contains(".global _main"));
    assert!(asm.contains("_fn:"));
    assert!(asm.contains("call _fn"));

    // Emission follows declaration order
    let fn_at = asm.find("_fn:").expect("fn label");
    let main_at = asm.find("_main:").expect("main label");
    assert!(fn_at < main_at);
}

#[test]
fn value_definitions_never_reach_the_backends() {
    let src = "(define answer 42)(define main (func:int answer))";

    let asm = compile_to(src, Target::X86_64Linux);
    assert!(asm.contains("movl $42, %eax"));
    assert!(!asm.contains("answer"));

    let c = compile_to(src, Target::C);
    assert!(c.contains("return 42;"));
    assert!(!c.contains("answer"));
}

#[test]
fn assignments_to_definitions_are_rejected() {
    for src in [
        "(define f (func:int 1))(define main (func:int (= f 2)))",
        "(define x 42)(define main (func:int (= x 2)))",
    ] {
        let source = SourceFile::from_string(src);
        let errors = compile(&source, &CompileOptions::default())
            .expect_err("assignment to a definition should not compile");
        assert!(
            errors[0].message.contains("cannot assign to"),
            "unexpected errors for {src}: {errors:?}"
        );
    }
}

#[test]
fn nested_call_arguments_are_preserved() {
    let src = "(define g (func (x:int):int (+ x 1)))\
               (define f (func (x:int y:int):int (+ x y)))\
               (define main (func:int (f 1 (g 2))))";

    for target in Target::iter() {
        let out = compile_to(src, target);
        assert!(!out.is_empty(), "{target}");
    }

    // The outer call's first argument must not sit in a register while the
    // inner call runs
    let asm = compile_to(src, Target::X86_64Linux);
    assert!(!asm.contains("movl %eax, %edi"));
    let c = compile_to(src, Target::C);
    assert!(c.contains("_f(1, _g(2))"));
}

#[test]
fn division_by_constant_zero_survives_to_runtime() {
    let asm = compile_to("(define main (func:int (/ 1 0)))", Target::X86_64Linux);
    assert!(asm.contains("idivl %ecx"));
}

#[test]
fn errors_carry_positions_and_stop_the_compile() {
    let source = SourceFile::from_string("(define main (func:int\n(fn 1 2)))");
    let errors = compile(&source, &CompileOptions::default())
        .expect_err("compile should fail");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("calling undeclared function 'fn'"));
    assert_eq!(source.line_for_position(errors[0].span.start), 2);
}
