//! Stable error codes and rendering across all passes.

mod common;

use common::{compile_err, err_code};

#[test]
fn lexer_codes() {
    assert_eq!(err_code("fn main() -> Int { \"oops }"), "MD1002");
    assert_eq!(err_code("fn main() -> Int { 'ab' }"), "MD1004");
    assert_eq!(err_code("fn main() -> Int { # }"), "MD1001");
    assert_eq!(err_code("/* open\nfn main() -> Int { 0 }"), "MD1005");
}

#[test]
fn parser_expected_token_code_and_hint_location() {
    let err = compile_err("fn main( { 0 }");
    assert!(err.contains("error[MD2001]"), "got {err}");
    assert!(err.contains("expected "), "got {err}");
    assert!(err.starts_with("test.mdr:1:"), "got {err}");
}

#[test]
fn resolver_codes() {
    assert_eq!(err_code("fn main() -> Int { 0 }\nfn main() -> Int { 1 }"), "MD3001");
    assert_eq!(err_code("enum T { A }\nenum T { B }\nfn main() -> Int { 0 }"), "MD3002");
    assert_eq!(err_code("enum T { A, A }\nfn main() -> Int { 0 }"), "MD3003");
    assert_eq!(err_code("fn helper() -> Int { 0 }"), "MD3004");
    assert_eq!(err_code("error E\nerror E\nfn main() -> Int { 0 }"), "MD3005");
}

#[test]
fn checker_codes() {
    assert_eq!(err_code("fn main() -> Int { y }"), "MD3101");
    assert_eq!(err_code("fn main() -> Int { let x: Int = \"hi\"\n x }"), "MD3102");
    assert_eq!(err_code("fn main() -> Int { let x := 1\n x = 2\n x }"), "MD3103");
    assert_eq!(err_code("fn f(x: Int) -> Int { x }\nfn main() -> Int { f(1, 2) }"), "MD3104");
    assert_eq!(err_code("fn main() -> Int { let x := 1?\n x }"), "MD3105");
    assert_eq!(
        err_code("fn f() -> Result[Int, String] { Ok(1) }\nfn main() -> Int { let v := f()?\n v }"),
        "MD3106"
    );
    assert_eq!(err_code("fn main() -> Int { match 1 { Ok(v) => v } }"), "MD3107");
    assert_eq!(
        err_code("enum T { A }\nfn main() -> Int { let t := A()\n match t { B(v) => 0 } }"),
        "MD3108"
    );
    assert_eq!(
        err_code("enum A { V }\nenum B { V }\nfn main() -> Int { let x := V()\n 0 }"),
        "MD3109"
    );
    assert_eq!(err_code("fn main() -> Int { spawn 1 }"), "MD3110");
    assert_eq!(
        err_code("fn f() -> Result[Int, String] { raise Nope(\"x\") }\nfn main() -> Int { 0 }"),
        "MD3111"
    );
    assert_eq!(err_code("error E\nfn main() -> Int { raise E(\"x\") }"), "MD3112");
    assert_eq!(err_code("fn main() -> Int { match true { true => 1 } }"), "MD3100");
}

#[test]
fn borrow_codes() {
    assert_eq!(
        err_code("fn main() -> Int { let s: String = \"x\"\n let t := s\n print(s)\n 0 }"),
        "MD4001"
    );
    assert_eq!(
        err_code("fn main() -> Int { let s: String = \"x\"\n let a := &s\n let b := &mut s\n 0 }"),
        "MD4002"
    );
    assert_eq!(
        err_code("fn main() -> Int { let s: String = \"x\"\n let a := &mut s\n let b := &s\n 0 }"),
        "MD4003"
    );
    assert_eq!(
        err_code(
            "fn main() -> Int { let s: String = \"x\"\n if true { let t := s\n 0 } else { 0 }\n let b := &mut s\n 0 }"
        ),
        "MD4004"
    );
    assert_eq!(
        err_code("fn main() -> Int { let s: String = \"x\"\n let a := &mut s\n print(s)\n 0 }"),
        "MD4005"
    );
}

#[test]
fn diagnostics_render_file_line_and_column() {
    let err = compile_err("fn main() -> Int {\n  let x := 1?\n  x\n}");
    assert!(err.starts_with("test.mdr:2:"), "got {err}");
    assert!(err.contains("error[MD3105]"), "got {err}");
}

#[test]
fn hints_render_on_a_second_line() {
    let err = compile_err("fn main() -> Int { match true { true => 1 } }");
    assert!(err.contains("\n  hint: "), "got {err}");
}
