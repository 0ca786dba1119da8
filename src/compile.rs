//! The source-text-to-output-text pipeline. Phases run strictly in order
//! and any accumulated diagnostics stop the compile before the next phase;
//! the backends only ever see fully checked, folded, expanded and tagged
//! packages.

use crate::{
    backend::Target,
    diagnostics::Diagnostic,
    frontend::{SourceFile, SourceFileOrigin, parser::Parser},
    middle::{ast_lowering, expand, fold, tag, type_check},
};

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub target: Target,
    /// Constant folding is on unless explicitly disabled
    pub fold: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: Target::default(),
            fold: true,
        }
    }
}

/// Compiles a source file to assembly or C text
pub fn compile(source: &SourceFile, options: &CompileOptions) -> Result<String, Vec<Diagnostic>> {
    let file = Parser::parse_file(source)?;

    let package_name = match &source.origin {
        SourceFileOrigin::Memory => "main".to_string(),
        SourceFileOrigin::File(path) => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string()),
    };

    let mut package = ast_lowering::lower_file(&file, &package_name)?;

    let diagnostics = type_check::check(&mut package);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    if options.fold {
        fold::fold(&mut package);
    }
    expand::expand(&mut package);
    tag::tag(&mut package);

    Ok(options.target.generate(&package))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_with(src: &str, target: Target) -> String {
        let source = SourceFile::from_string(src);
        compile(
            &source,
            &CompileOptions {
                target,
                fold: true,
            },
        )
        .expect("program should compile")
    }

    #[test]
    fn every_target_accepts_the_scenario_programs() {
        use strum::IntoEnumIterator;

        for src in [
            "(define main (func:int 42))",
            "(define main (func:int (+ 5 3)))",
            "(define fn (func (a:int b:int):int (+ a b)))\
             (define main (func:int (fn 1 2)))",
            "(define main (func:int (if true :int 99)))",
            "(define main (func:int (if false :int 2 3)))",
            "(define main (func:int (var (a:int):int (= a 42) a)))",
            "(define main (func:int -24))",
        ] {
            for target in Target::iter() {
                let out = compile_with(src, target);
                assert!(!out.is_empty(), "{target}: {src}");
            }
        }
    }

    #[test]
    fn semantic_errors_stop_the_compile() {
        let source = SourceFile::from_string("(define main (func:int (+ a true)))");
        let diagnostics = compile(&source, &CompileOptions::default())
            .expect_err("compile should fail");

        // Both independent errors are reported together
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].message.contains("undeclared variable 'a'"));
        assert!(diagnostics[1].message.contains("operator '+'"));
    }

    #[test]
    fn parse_errors_stop_the_compile() {
        let source = SourceFile::from_string("(define main (func:int 42)");
        compile(&source, &CompileOptions::default()).expect_err("compile should fail");
    }

    #[test]
    fn disabling_folding_keeps_the_arithmetic() {
        let source = SourceFile::from_string("(define main (func:int (+ 5 3)))");
        let unfolded = compile(
            &source,
            &CompileOptions {
                target: Target::X86_64Linux,
                fold: false,
            },
        )
        .expect("program should compile");

        assert!(unfolded.contains("addl %edx, %eax"));
    }
}
