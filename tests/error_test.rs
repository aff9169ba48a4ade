//! Parser error tests: every failure is reported with a message and,
//! where one exists, the location of the offending text

mod helpers;

use helpers::*;
use objgraph::{ErrorKind, Parser, Registry};

fn check_error(reg: &Registry, input: &str, pattern: &str) {
    let err = parse_err(reg, input);
    assert!(
        err.contains(pattern),
        "error for {input:?} was {err:?}; expected it to contain {pattern:?}"
    );
}

#[test]
fn test_bad_file() {
    let reg = registry();
    let err = Parser::new(&reg)
        .parse_file("/no/such/file/exists")
        .unwrap_err();
    assert!(err.is(ErrorKind::IncludeIo));
    assert!(err.message.contains("Failed to open file"));
}

#[test]
fn test_object_type_conflict() {
    let mut reg = registry();
    let err = reg.add_type(simple_spec()).unwrap_err();
    assert!(err.is(ErrorKind::DuplicateType));
    assert!(err.to_string().contains("Object type registered more than once"));
}

#[test]
fn test_bad_reference() {
    let input = r#"Derived {
  simple_list: [
      Simple "Child1" {},
      USE "Child2",
  ],
}
"#;
    let reg = registry();
    let err = Parser::new(&reg).parse_str(input).unwrap_err();
    assert!(err.is(ErrorKind::ReferenceResolution));
    assert!(err.message.contains("Missing object with name 'Child2'"));
    assert_eq!(err.location.as_ref().map(|l| l.line), Some(4));
}

#[test]
fn test_typed_reference_errors() {
    let reg = registry();
    check_error(
        &reg,
        r#"Derived { simple: Simple "Nope" }"#,
        "Invalid reference to object of type 'Simple' with name 'Nope'",
    );
    check_error(
        &reg,
        r#"Derived { simple: Simple "O" {}, simple_list: [Derived "O";] }"#,
        "Invalid reference to object of type 'Derived' with name 'O'",
    );
}

#[test]
fn test_syntax_errors() {
    let reg = registry();
    let cases = [
        (" ", "Invalid empty name for object type"),
        (" 01BadName {}", "Invalid name"),
        ("Simplex", "Unknown object type"),
        ("Simple =", "Expected '{'"),
        ("Simple { bool_val: z }", "Invalid bool value"),
        ("Simple { bool_val: tralse }", "Invalid bool value"),
        ("Simple { int_val: 9 x }", "Expected ',' or '}'"),
        ("Simple { int_val: b }", "Invalid integer value"),
        ("Simple { int_val: 123b }", "Invalid integer value"),
        ("Simple { int_val: 0xa1 }", "Invalid integer value"),
        ("Simple { uint_val: -12 }", "Invalid unsigned integer value"),
        ("Simple { uint_val: +4 }", "Invalid unsigned integer value"),
        ("Simple { uint_val: 0xqb }", "Invalid unsigned integer value"),
        ("Simple { uint_val: 0x12345667875675 }", "Invalid unsigned integer value"),
        ("Simple { str_val: \"", "Found EOF inside quoted string"),
        ("Simple { str_val: \"a\\qb\" }", "Invalid escape sequence"),
        ("Simple { vec3f_val: 12 abc 4 }", "Invalid float value"),
        ("Simple { vec3f_val: 1 2 }", "Invalid float value"),
        ("Simple { enum_val: \"glorp\" }", "Invalid value for enum"),
        ("Simple { flag_val: \"glorp\" }", "Invalid value for flag enum"),
        ("Simple { flag_val: \"F1|x\" }", "Invalid value for flag enum"),
        ("Simple", "EOF"),
        ("Simple { bad_field: 13 }", "Unknown field"),
        ("Simple { int_val 13 }", "Expected ':'"),
        ("Simple {} Simple {}", "Expected end of input"),
        ("<\"include/with/eof\"", "Expected '>', got EOF"),
        ("<\"\">", "Invalid empty path"),
        ("<include>", "Expected quoted path"),
        ("Derived { simple: Other {} }", "Incorrect object type"),
        ("Derived { simple_list: [Other {}] }", "Incorrect object type"),
        ("Simple { int_val: 1, [A: \"1\"] }", "Constants must appear before fields"),
        ("Derived { int_val: 1, TEMPLATES: [] }", "Templates must appear before fields"),
        ("Simple { [A: 1] }", "Expected quoted string value for constant"),
        ("Simple { int_val: $ }", "Expected constant name after '$'"),
        ("Derived { simple: CLONE \"X\" }", "Expected quoted name for the clone"),
    ];
    for (input, pattern) in cases {
        check_error(&reg, input, pattern);
    }
}

#[test]
fn test_error_kinds() {
    let reg = registry();
    let parser = Parser::new(&reg);
    let kind = |input: &str| parser.parse_str(input).unwrap_err().kind;
    assert_eq!(kind("Simple { str_val: \""), ErrorKind::Lexical);
    assert_eq!(kind("Simple ="), ErrorKind::Syntax);
    assert_eq!(kind("Simplex {}"), ErrorKind::UnknownType);
    assert_eq!(kind("Simple { nope: 1 }"), ErrorKind::UnknownField);
    assert_eq!(kind("Simple { int_val: 1.5 }"), ErrorKind::ValueConversion);
    assert_eq!(kind("Derived { simple: USE \"x\" }"), ErrorKind::ReferenceResolution);
    assert_eq!(kind("<\"no/such/file.og\">"), ErrorKind::IncludeIo);
}

#[test]
fn test_error_in_included_file_reports_inner_location() {
    let reg = registry();
    let included = temp_file("Simple {\n  bad_field: 12\n}\n");
    let input = format!(
        "Derived {{ simple: <\"{}\"> }}",
        included.path().display()
    );
    let err = Parser::new(&reg).parse_str(&input).unwrap_err();
    assert!(err.message.contains("Unknown field"));
    let location = err.location.unwrap();
    assert_eq!(location.path.as_path(), included.path());
    assert_eq!(location.line, 2);
    assert_eq!(location.column, 3);
}

#[test]
fn test_error_in_substituted_constant_points_at_dollar() {
    let reg = registry();
    let input = "Simple {\n  [V: \"1 2 zz\"],\n  vec3f_val: $V\n}";
    let err = Parser::new(&reg).parse_str(input).unwrap_err();
    assert!(err.message.contains("Invalid float value"), "{err}");
    let location = err.location.unwrap();
    assert_eq!((location.line, location.column), (3, 14));
}

#[test]
fn test_error_display_includes_location() {
    let reg = registry();
    let err = parse_err(&reg, "Simple {\n  int_val: x\n}");
    assert!(err.starts_with("<string>:2: Parse error: Invalid integer value"), "{err}");
}

#[test]
fn test_parse_file_as_checks_root_type() {
    let reg = registry();
    let file = temp_file("Simple {}");
    let err = Parser::new(&reg)
        .parse_file_as(file.path(), "Derived")
        .unwrap_err();
    assert!(err.message.contains("Expected a Derived; got Simple"));

    let derived = temp_file("Derived {}");
    assert!(Parser::new(&reg).parse_file_as(derived.path(), "Simple").is_ok());
}

#[test]
fn test_abstract_type_cannot_be_instantiated() {
    let mut reg = Registry::new();
    reg.add_type(simple_spec().into_abstract()).unwrap();
    reg.add_type(derived_spec()).unwrap();
    let err = Parser::new(&reg).parse_str("Simple {}").unwrap_err();
    assert!(err.message.contains("Cannot create instance of abstract type"));
    assert!(Parser::new(&reg)
        .parse_str("Derived { simple: Derived {} }")
        .is_ok());
}
