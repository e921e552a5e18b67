use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Result;
use pretty_assertions::assert_eq;

use prepass_core::passes::selector;
use prepass_core::{
    prepass_file, CallIssueKind, InMemoryResolver, Pipeline, PrepassConfig, PrepassError,
    PrepassOutput, SolidityParser,
};

fn config(main: &str) -> PrepassConfig {
    PrepassConfig {
        main_contract: main.to_string(),
        ..PrepassConfig::default()
    }
}

fn run_with(
    resolver: &InMemoryResolver,
    path: &str,
    source: &str,
    main: &str,
) -> prepass_core::Result<PrepassOutput> {
    Pipeline::standard().run(
        source,
        Path::new(path),
        &SolidityParser::new(),
        resolver,
        &config(main),
    )
}

fn run(source: &str, main: &str) -> prepass_core::Result<PrepassOutput> {
    run_with(&InMemoryResolver::new(), "Main.sol", source, main)
}

#[test]
fn test_base_constructor_arguments_are_flattened() -> Result<()> {
    let output = run(
        "contract A { constructor(uint x) {} } contract B is A(5) { }",
        "B",
    )?;
    assert_eq!(
        output.source,
        "contract A { function __constructor_A(uint x) internal {} } contract B is A {\n    constructor() {\n        __constructor_A(5);\n    }\n }"
    );
    assert!(output.warnings.is_empty());

    let report = &output.metadata.constructors[0];
    assert_eq!(report.contract, "B");
    assert!(report.applied);
    assert_eq!(report.initializers, vec!["__constructor_A(5)"]);
    Ok(())
}

#[test]
fn test_colliding_overloads_and_their_calls_are_renamed() -> Result<()> {
    let source = "contract A {
    function foo(uint x) public {}
    function foo(uint[] memory x) public {}
    function bar(uint[] memory xs) public { foo(1); foo(xs); }
}";
    let output = run(source, "A")?;
    assert_eq!(
        output.source,
        "contract A {
    function foo(uint x) public {}
    function foo_uint256_dyn(uint[] memory x) public {}
    function bar(uint[] memory xs) public { foo(1); foo_uint256_dyn(xs); }
}"
    );

    let marked = &output.metadata.marked_functions.entries;
    assert_eq!(marked.len(), 2);
    assert_eq!(marked[0].original_selector, marked[1].original_selector);
    let selectors: HashSet<_> = marked.iter().map(|m| m.selector.as_str()).collect();
    assert_eq!(selectors.len(), 2);
    assert_eq!(marked[1].original_name, "foo");
    assert_eq!(marked[1].new_name.as_deref(), Some("foo_uint256_dyn"));
    Ok(())
}

#[test]
fn test_cyclic_import_fails_without_output() {
    let resolver = InMemoryResolver::new()
        .with_file("A.sol", "import \"./B.sol\";\ncontract A {}")
        .with_file("B.sol", "import \"./A.sol\";\ncontract B {}");
    let err = run_with(&resolver, "A.sol", "import \"./B.sol\";\ncontract A {}", "A").unwrap_err();

    match err.root() {
        PrepassError::CyclicImport { chain } => {
            assert_eq!(chain, &vec!["A.sol", "B.sol", "A.sol"]);
        }
        other => panic!("expected a cyclic import, got {other}"),
    }
    assert!(matches!(err, PrepassError::InPass { pass: "imports", .. }));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_unresolved_call_is_a_warning() -> Result<()> {
    let source = "contract Token {\n    function mint() public {\n        missing(1);\n    }\n}";
    let output = run(source, "Token")?;

    assert_eq!(output.source, source);
    assert_eq!(output.warnings.len(), 1);
    let warning = &output.warnings[0];
    assert_eq!(warning.kind, CallIssueKind::Unresolved);
    assert_eq!(warning.callee, "missing");
    assert_eq!((warning.line, warning.column), (3, 9));
    Ok(())
}

#[test]
fn test_diamond_imports_splice_shared_file_once() -> Result<()> {
    let resolver = InMemoryResolver::new()
        .with_file("B.sol", "import \"D.sol\";\ncontract B is D {}")
        .with_file("C.sol", "import \"D.sol\";\ncontract C is D {}")
        .with_file("D.sol", "contract D {}");
    let output = run_with(
        &resolver,
        "Main.sol",
        "import \"B.sol\";\nimport \"C.sol\";\ncontract Main is B, C {}",
        "Main",
    )?;
    assert_eq!(
        output.source,
        "contract D {}\ncontract B is D {}\n\ncontract C is D {}\ncontract Main is B, C {}"
    );
    Ok(())
}

#[test]
fn test_flattened_output_is_a_fixed_point() -> Result<()> {
    let resolver = InMemoryResolver::new().with_file(
        "Base.sol",
        "// shared base\ncontract Base { uint256 total; function add(uint256 v) internal { total += v; } }",
    );
    let first = run_with(
        &resolver,
        "Main.sol",
        "import \"Base.sol\";\ncontract Main is Base { function f() public { add(1); } }",
        "Main",
    )?;
    assert!(!first.source.contains("import"));
    assert!(!first.source.contains("shared base"));

    let second = run(&first.source, "Main")?;
    assert_eq!(second.source, first.source);
    Ok(())
}

#[test]
fn test_no_synthesis_without_base_constructor_parameters() -> Result<()> {
    let source = "contract A { constructor() {} } contract B is A { function f() public {} }";
    let output = run(source, "B")?;
    assert_eq!(output.source, source);
    assert!(!output.metadata.constructors[0].synthesized);
    assert!(!output.metadata.constructors[0].applied);
    Ok(())
}

#[test]
fn test_missing_base_arguments_are_a_user_error() {
    let err = run(
        "contract A { constructor(uint x, uint y) {} } contract B is A(1) {}",
        "B",
    )
    .unwrap_err();
    assert!(matches!(
        err.root(),
        PrepassError::MissingConstructorArgs { parameter, .. } if parameter == "y"
    ));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_unknown_main_contract() {
    let err = run("contract A {}", "Missing").unwrap_err();
    assert!(matches!(err.root(), PrepassError::UnknownContract(name) if name == "Missing"));
}

#[test]
fn test_metadata_serializes() -> Result<()> {
    let output = run(
        "contract Vault { address owner; function setOwner(address next) public { owner = next; } }",
        "Vault",
    )?;
    let value = serde_json::to_value(&output)?;
    assert_eq!(value["metadata"]["main_contract"], "Vault");
    assert_eq!(value["metadata"]["storage"]["variables"][0]["name"], "owner");
    assert_eq!(
        value["metadata"]["storage"]["accesses"]["Vault.owner"][0],
        "Vault.setOwner(address)"
    );
    Ok(())
}

#[test]
fn test_files_on_disk_resolve_relative_and_include_paths() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let lib = dir.path().join("lib");
    fs::create_dir_all(&lib)?;
    fs::write(
        lib.join("Ownable.sol"),
        "// access control\ncontract Ownable { address owner; constructor(address o) { owner = o; } }",
    )?;
    fs::write(lib.join("Math.sol"), "library Math { function one() internal pure returns (uint) { return 1; } }")?;
    let main = dir.path().join("Main.sol");
    fs::write(
        &main,
        "import \"./lib/Ownable.sol\";\nimport \"Math.sol\";\ncontract Main is Ownable(msg.sender) {}",
    )?;

    let config = PrepassConfig {
        include_paths: vec![lib],
        ..config("Main")
    };
    let output = prepass_file(&main, &config)?;

    assert!(!output.source.contains("import"));
    assert!(!output.source.contains("access control"));
    assert!(output.source.contains("library Math"));
    assert!(output
        .source
        .contains("function __constructor_Ownable(address o) internal { owner = o; }"));
    assert!(output.source.contains("contract Main is Ownable {"));
    assert!(output.source.contains("__constructor_Ownable(msg.sender);"));
    Ok(())
}

#[test]
fn test_missing_import_file() {
    let err = run("import \"Nope.sol\";\ncontract A {}", "A").unwrap_err();
    assert!(matches!(err.root(), PrepassError::FileNotFound { import, .. } if import == "Nope.sol"));
}

#[test]
fn test_calls_in_modifier_arguments_and_initializers_are_renamed() -> Result<()> {
    let source = "contract A {
    uint[] data;
    uint total = foo(data);
    modifier m(uint v) { _; }
    function foo(uint x) public returns (uint) { return x; }
    function foo(uint[] memory x) public returns (uint) { return x.length; }
    function g(uint[] memory xs) public m(foo(xs)) {}
}";
    let output = run(source, "A")?;
    assert_eq!(
        output.source,
        "contract A {
    uint[] data;
    uint total = foo_uint256_dyn(data);
    modifier m(uint v) { _; }
    function foo(uint x) public returns (uint) { return x; }
    function foo_uint256_dyn(uint[] memory x) public returns (uint) { return x.length; }
    function g(uint[] memory xs) public m(foo_uint256_dyn(xs)) {}
}"
    );
    Ok(())
}

#[test]
fn test_other_contract_inheriting_converted_base_calls_initializer() -> Result<()> {
    let output = run(
        "contract A{uint a; constructor(uint x){a=x;}} contract B is A(1){} contract D is A{constructor() A(2){}}",
        "B",
    )?;
    assert_eq!(
        output.source,
        "contract A{uint a; function __constructor_A(uint x) internal {a=x;}} contract B is A{\n    constructor() {\n        __constructor_A(1);\n    }\n} contract D is A{constructor() {\n        __constructor_A(2);}}"
    );
    let d = output
        .metadata
        .constructors
        .iter()
        .find(|r| r.contract == "D")
        .unwrap();
    assert!(d.applied);
    Ok(())
}

#[test]
fn test_selectors_stay_distinct_across_an_inheritance_chain() -> Result<()> {
    let source = "contract A {
    function foo(uint x) public {}
    function foo(uint[] memory x) public {}
}
contract B is A {
    function foo_uint256_dyn(uint x) public {}
}";
    let output = run(source, "B")?;
    assert!(output.source.contains("function foo_uint256_dyn_2(uint[] memory x) public {}"));
    assert!(output.source.contains("function foo_uint256_dyn(uint x) public {}"));

    let uint = vec!["uint256".to_string()];
    let mut selectors: Vec<String> = output
        .metadata
        .marked_functions
        .entries
        .iter()
        .filter(|m| m.contract == "B")
        .map(|m| m.selector.clone())
        .collect();
    assert_eq!(selectors.len(), 2);
    selectors.push(selector("foo_uint256_dyn", &uint));
    let distinct: HashSet<_> = selectors.iter().collect();
    assert_eq!(distinct.len(), selectors.len());

    let second = run(&output.source, "B")?;
    assert!(second.metadata.marked_functions.entries.is_empty());
    assert_eq!(second.source, output.source);
    Ok(())
}

#[test]
fn test_three_way_collision_is_fully_resolved() -> Result<()> {
    let source = "contract A {
    function foo(uint[] memory x) public {}
    function foo(uint x) public {}
    function foo(uint[][] memory x) public {}
    function bar(uint[][] memory grid) public { foo(grid); }
}";
    let output = run(source, "A")?;
    assert!(output.source.contains("function foo_uint256_dyn(uint[] memory x) public {}"));
    assert!(output.source.contains("function foo_uint256_dyn_dyn(uint[][] memory x) public {}"));
    assert!(output.source.contains("{ foo_uint256_dyn_dyn(grid); }"));

    let marked = &output.metadata.marked_functions.entries;
    assert_eq!(marked.len(), 3);
    let selectors: HashSet<_> = marked.iter().map(|m| m.selector.as_str()).collect();
    assert_eq!(selectors.len(), 3);

    let second = run(&output.source, "A")?;
    assert!(second.metadata.marked_functions.entries.is_empty());
    Ok(())
}

#[test]
fn test_named_base_arguments_are_substituted() -> Result<()> {
    let output = run(
        "contract A { constructor(uint x) {} } contract B is A { constructor(uint x) A({x: x}) {} } contract C is B(7) {}",
        "C",
    )?;
    assert!(output.source.contains("__constructor_A({x: 7});"));
    assert!(output.source.contains("__constructor_B(7);"));
    assert!(output.source.contains("function __constructor_B(uint x) internal {}"));
    let report = &output.metadata.constructors[0];
    assert_eq!(report.initializers, vec!["__constructor_A({x: 7})", "__constructor_B(7)"]);
    Ok(())
}
