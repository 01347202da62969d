//! End-to-end tests for ctxplumb
//!
//! Each test builds a temporary Go module, runs the engine against a target,
//! and compares the rewritten files against expected output. Fixtures are
//! gofmt-shaped, the way real Go code in a module is.

mod common;

use common::TestRepo;
use ctxplumb::CtxPlumbError;

// ============================================================================
// SIMPLE ADD
// ============================================================================

const SIMPLE_INPUT: &str = r#"package main

// Package-level comment stays here

import (
	"fmt" // say hello
)

// DoThing does something.
// It should get a ctx parameter inserted, but comments must remain.
func DoThing() {
	fmt.Println("hi") // inline comment
}

func main() {
	DoThing()
}
"#;

const SIMPLE_EXPECTED: &str = r#"package main

// Package-level comment stays here

import (
	"context"
	"fmt" // say hello
)

// DoThing does something.
// It should get a ctx parameter inserted, but comments must remain.
func DoThing(ctx context.Context) {
	fmt.Println("hi") // inline comment
}

func main() {
	ctx := context.Background()
	DoThing(ctx)
}
"#;

#[test]
fn simple_add_preserves_comments() {
    let repo = TestRepo::new();
    repo.add_file("main.go", SIMPLE_INPUT);

    repo.run_target(&repo.target("main.go", "DoThing")).unwrap();

    assert_eq!(repo.read("main.go"), SIMPLE_EXPECTED);
}

#[test]
fn rerun_is_a_no_op() {
    let repo = TestRepo::new();
    repo.add_file("main.go", SIMPLE_INPUT);

    repo.run_target(&repo.target("main.go", "DoThing")).unwrap();
    let after_first = repo.read("main.go");

    repo.run_target(&repo.target("main.go", "DoThing")).unwrap();
    assert_eq!(repo.read("main.go"), after_first);
}

// ============================================================================
// PROPAGATION ACROSS PACKAGES, STOP AT MAIN
// ============================================================================

#[test]
fn propagate_stops_at_main() {
    let repo = TestRepo::new();
    repo.add_file("a/b.go", "package a\n\nfunc Callee() {\n}\n");
    repo.add_file(
        "a/a.go",
        "package a\n\nfunc Caller() {\n\tCallee()\n}\n",
    );
    repo.add_file(
        "main.go",
        "package main\n\nimport \"example.com/e2e/a\"\n\nfunc main() {\n\ta.Caller()\n}\n",
    );

    repo.run_target(&repo.target("a/b.go", "Callee")).unwrap();

    assert_eq!(
        repo.read("a/b.go"),
        "package a\n\nimport \"context\"\n\nfunc Callee(ctx context.Context) {\n}\n"
    );
    assert_eq!(
        repo.read("a/a.go"),
        "package a\n\nimport \"context\"\n\nfunc Caller(ctx context.Context) {\n\tCallee(ctx)\n}\n"
    );
    assert_eq!(
        repo.read("main.go"),
        "package main\n\nimport \"context\"\nimport \"example.com/e2e/a\"\n\nfunc main() {\n\tctx := context.Background()\n\ta.Caller(ctx)\n}\n"
    );
}

// ============================================================================
// HTTP BOUNDARY
// ============================================================================

#[test]
fn http_boundary_derives_ctx_from_request() {
    let repo = TestRepo::new();
    repo.add_file(
        "srv/srv.go",
        "package srv\n\nimport \"net/http\"\n\nfunc Handler(w http.ResponseWriter, r *http.Request) {\n\tinner()\n}\n\nfunc inner() {\n}\n",
    );

    let mut opts = repo.opts(&repo.target("srv/srv.go", "inner"));
    opts.http = true;
    ctxplumb::run(&opts).unwrap();

    assert_eq!(
        repo.read("srv/srv.go"),
        "package srv\n\nimport \"context\"\nimport \"net/http\"\n\nfunc Handler(w http.ResponseWriter, r *http.Request) {\n\tctx := r.Context()\n\tinner(ctx)\n}\n\nfunc inner(ctx context.Context) {\n}\n"
    );
}

#[test]
fn http_boundary_ignored_without_flag() {
    // Without --http the handler is not a boundary; propagation keeps going
    // and the handler itself gains a parameter.
    let repo = TestRepo::new();
    repo.add_file(
        "srv/srv.go",
        "package srv\n\nimport \"net/http\"\n\nfunc Handler(w http.ResponseWriter, r *http.Request) {\n\tinner()\n}\n\nfunc inner() {\n}\n",
    );

    repo.run_target(&repo.target("srv/srv.go", "inner")).unwrap();

    let out = repo.read("srv/srv.go");
    assert!(out.contains("func Handler(ctx context.Context, w http.ResponseWriter, r *http.Request) {"));
    assert!(out.contains("\tinner(ctx)\n"));
    assert!(!out.contains("r.Context()"));
}

// ============================================================================
// TESTING BOUNDARY
// ============================================================================

#[test]
fn testing_boundary_binds_from_t() {
    let repo = TestRepo::new();
    repo.add_file("main.go", "package main\n\nfunc Callee() {\n}\n\nfunc main() {\n}\n");
    repo.add_file(
        "main_test.go",
        "package main\n\nimport \"testing\"\n\nfunc TestCallee(t *testing.T) {\n\tCallee()\n}\n",
    );

    repo.run_target(&repo.target("main.go", "Callee")).unwrap();

    assert_eq!(
        repo.read("main_test.go"),
        "package main\n\nimport \"testing\"\n\nfunc TestCallee(t *testing.T) {\n\tctx := t.Context()\n\tCallee(ctx)\n}\n"
    );
    // main() has no call site and stays untouched.
    assert!(repo.read("main.go").contains("func main() {\n}\n"));
}

#[test]
fn testing_boundary_binds_before_leading_discard() {
    // The handle must be live before every statement of the test, leading
    // pre-flight discards included.
    let repo = TestRepo::new();
    repo.add_file(
        "helper_test.go",
        "package main\n\nimport \"testing\"\n\nfunc HelperTarget() string {\n\treturn \"x\"\n}\n\nfunc TestHelper(t *testing.T) {\n\t_ = HelperTarget()\n}\n",
    );
    repo.add_file("main.go", "package main\n\nfunc main() {\n}\n");

    repo.run_target(&repo.target("helper_test.go", "HelperTarget"))
        .unwrap();

    assert_eq!(
        repo.read("helper_test.go"),
        "package main\n\nimport \"context\"\nimport \"testing\"\n\nfunc HelperTarget(ctx context.Context) string {\n\treturn \"x\"\n}\n\nfunc TestHelper(t *testing.T) {\n\tctx := t.Context()\n\t_ = HelperTarget(ctx)\n}\n"
    );
}

// ============================================================================
// BLANK AND EXISTING HANDLE PARAMETERS
// ============================================================================

#[test]
fn rename_blank_ctx_param() {
    let repo = TestRepo::new();
    repo.add_file(
        "main.go",
        "package main\n\nimport \"context\"\n\nfunc target(_ context.Context) {\n}\n\nfunc main() {\n}\n",
    );

    repo.run_target(&repo.target("main.go", "target")).unwrap();

    assert_eq!(
        repo.read("main.go"),
        "package main\n\nimport \"context\"\n\nfunc target(ctx context.Context) {\n}\n\nfunc main() {\n}\n"
    );
}

#[test]
fn unnamed_context_param_gets_named() {
    // Implementer decision pinned: an unnamed handle parameter is named in
    // place; a second handle parameter is never inserted.
    let repo = TestRepo::new();
    repo.add_file(
        "main.go",
        "package main\n\nimport \"context\"\n\nfunc target(context.Context) {\n}\n\nfunc main() {\n}\n",
    );

    repo.run_target(&repo.target("main.go", "target")).unwrap();

    let out = repo.read("main.go");
    assert!(out.contains("func target(ctx context.Context) {"));
    assert_eq!(out.matches("context.Context").count(), 1);
}

#[test]
fn reuse_existing_named_no_changes() {
    let input = "package main\n\nimport \"context\"\n\nfunc target(myCtx context.Context) {\n}\n\nfunc main() {\n\tctx := context.Background()\n\ttarget(ctx)\n}\n";
    let repo = TestRepo::new();
    repo.add_file("main.go", input);

    repo.run_target(&repo.target("main.go", "target")).unwrap();

    // The target already carries a handle parameter: no caller is modified,
    // no file changes at all.
    assert_eq!(repo.read("main.go"), input);
}

#[test]
fn reuse_blank_midlevel_stops_propagation() {
    // A mid-level function with a blank handle parameter gets the blank
    // renamed and reused, and its callers are NOT walked: they already pass
    // the argument positionally.
    let input = "package main\n\nimport \"context\"\n\nfunc target() {}\n\nfunc funcOne() {\n\ttarget()\n}\n\nfunc funcTwo(_ context.Context) {\n\tfuncOne()\n}\n\nfunc main() {\n\tctx := context.Background()\n\tfuncTwo(ctx)\n}\n";
    let repo = TestRepo::new();
    repo.add_file("main.go", input);

    repo.run_target(&repo.target("main.go", "target")).unwrap();

    let expected = "package main\n\nimport \"context\"\n\nfunc target(ctx context.Context) {}\n\nfunc funcOne(ctx context.Context) {\n\ttarget(ctx)\n}\n\nfunc funcTwo(ctx context.Context) {\n\tfuncOne(ctx)\n}\n\nfunc main() {\n\tctx := context.Background()\n\tfuncTwo(ctx)\n}\n";
    assert_eq!(repo.read("main.go"), expected);
}

// ============================================================================
// BIG EXAMPLE: MIXED REUSE, RENAME, AND WEIRD NAMES
// ============================================================================

const BIG_INPUT: &str = r#"package main

import "context"

func target() {}

func funcOne() {
	target()
}

func funcTwo() {
	funcOne()
}

func funcThreeA(_ context.Context) {
	funcTwo()
}

func funcThreeB() {
	funcOne()
}

func funcThreeC(myWeirdlyNamedCtx context.Context) {
	funcTwo()
}

func funcFour() {
	funcThreeB()
}

func main() {
	ctx := context.Background()
	funcFour()
	funcThreeA(ctx)
	funcThreeC(ctx)
}
"#;

const BIG_EXPECTED: &str = r#"package main

import "context"

func target(ctx context.Context) {}

func funcOne(ctx context.Context) {
	target(ctx)
}

func funcTwo(ctx context.Context) {
	funcOne(ctx)
}

func funcThreeA(ctx context.Context) {
	funcTwo(ctx)
}

func funcThreeB(ctx context.Context) {
	funcOne(ctx)
}

func funcThreeC(myWeirdlyNamedCtx context.Context) {
	funcTwo(myWeirdlyNamedCtx)
}

func funcFour(ctx context.Context) {
	funcThreeB(ctx)
}

func main() {
	ctx := context.Background()
	funcFour(ctx)
	funcThreeA(ctx)
	funcThreeC(ctx)
}
"#;

#[test]
fn big_example_propagates_through_mixed_signatures() {
    let repo = TestRepo::new();
    repo.add_file("main.go", BIG_INPUT);

    repo.run_target(&repo.target("main.go", "target")).unwrap();

    assert_eq!(repo.read("main.go"), BIG_EXPECTED);
}

// ============================================================================
// LINE DISAMBIGUATION AND METHODS
// ============================================================================

const METHODS_INPUT: &str = r#"package main

import "fmt"

type A struct{}

type B struct{}

func (a *A) target() {
	fmt.Println("a")
}

func (b *B) target() {
	fmt.Println("b")
}

func main() {
	a := &A{}
	b := &B{}
	a.target()
	b.target()
}
"#;

#[test]
fn line_number_selects_one_of_two_methods() {
    let repo = TestRepo::new();
    repo.add_file("main.go", METHODS_INPUT);

    // The (A) method declaration begins on line 9.
    let target = format!("{}:9", repo.target("main.go", "target"));
    repo.run_target(&target).unwrap();

    let out = repo.read("main.go");
    assert!(out.contains("func (a *A) target(ctx context.Context) {"));
    assert!(out.contains("func (b *B) target() {"));
    assert!(out.contains("\ta.target(ctx)\n"));
    assert!(out.contains("\tb.target()\n"));
    assert!(out.contains("\tctx := context.Background()\n"));
}

#[test]
fn ambiguous_target_requires_line_number() {
    let repo = TestRepo::new();
    repo.add_file("main.go", METHODS_INPUT);

    let err = repo
        .run_target(&repo.target("main.go", "target"))
        .unwrap_err();
    assert!(matches!(err, CtxPlumbError::AmbiguousTarget { count: 2, .. }));
}

#[test]
fn method_chain_propagates_through_receivers() {
    let repo = TestRepo::new();
    repo.add_file(
        "main.go",
        "package main\n\ntype Service struct{}\n\nfunc (s *Service) target() {\n}\n\nfunc (s *Service) caller() {\n\ts.target()\n}\n\nfunc main() {\n\ts := &Service{}\n\ts.caller()\n}\n",
    );

    repo.run_target(&repo.target("main.go", "target")).unwrap();

    assert_eq!(
        repo.read("main.go"),
        "package main\n\nimport \"context\"\n\ntype Service struct{}\n\nfunc (s *Service) target(ctx context.Context) {\n}\n\nfunc (s *Service) caller(ctx context.Context) {\n\ts.target(ctx)\n}\n\nfunc main() {\n\tctx := context.Background()\n\ts := &Service{}\n\ts.caller(ctx)\n}\n"
    );
}

#[test]
fn qualified_call_distinguished_from_same_named_local() {
    // main has its own MyFunc; only the package-qualified call resolves to
    // the target object, so only that call site is rewritten.
    let repo = TestRepo::new();
    repo.add_file("xyz/xyz.go", "package xyz\n\nfunc MyFunc() {\n}\n");
    repo.add_file(
        "main.go",
        "package main\n\nimport \"example.com/e2e/xyz\"\n\nfunc MyFunc() {\n}\n\nfunc main() {\n\tMyFunc()\n\txyz.MyFunc()\n}\n",
    );

    repo.run_target(&repo.target("xyz/xyz.go", "MyFunc")).unwrap();

    assert_eq!(
        repo.read("xyz/xyz.go"),
        "package xyz\n\nimport \"context\"\n\nfunc MyFunc(ctx context.Context) {\n}\n"
    );
    assert_eq!(
        repo.read("main.go"),
        "package main\n\nimport \"context\"\nimport \"example.com/e2e/xyz\"\n\nfunc MyFunc() {\n}\n\nfunc main() {\n\tctx := context.Background()\n\tMyFunc()\n\txyz.MyFunc(ctx)\n}\n"
    );
}

// ============================================================================
// TWO CALLEES, ONE CALLER (I1 + DE-DUPLICATION)
// ============================================================================

#[test]
fn two_successive_runs_leave_one_ctx_param() {
    let repo = TestRepo::new();
    repo.add_file(
        "main.go",
        "package main\n\nfunc MyFunc() {\n\tMyOtherFunc1()\n\tMyOtherFunc2()\n}\n\nfunc MyOtherFunc1() {\n}\n\nfunc MyOtherFunc2() {\n}\n\nfunc main() {\n\tMyFunc()\n}\n",
    );

    repo.run_target(&repo.target("main.go", "MyOtherFunc1"))
        .unwrap();
    repo.run_target(&repo.target("main.go", "MyOtherFunc2"))
        .unwrap();

    let out = repo.read("main.go");
    assert!(out.contains("func MyFunc(ctx context.Context) {\n\tMyOtherFunc1(ctx)\n\tMyOtherFunc2(ctx)\n}"));
    // Exactly one handle parameter on MyFunc.
    assert_eq!(out.matches("func MyFunc(").count(), 1);
    assert_eq!(
        out.matches("ctx context.Context, ctx context.Context").count(),
        0
    );
    assert!(out.contains("func main() {\n\tctx := context.Background()\n\tMyFunc(ctx)\n}"));
}

// ============================================================================
// STOP-AT
// ============================================================================

#[test]
fn stop_at_terminates_at_named_function() {
    let repo = TestRepo::new();
    repo.add_file(
        "main.go",
        "package main\n\nimport \"context\"\n\nfunc Callee() {\n}\n\nfunc caller(ctx context.Context) {\n\tCallee()\n}\n\nfunc main() {\n\tcaller(context.Background())\n}\n",
    );

    let mut opts = repo.opts(&repo.target("main.go", "Callee"));
    opts.stop_at = repo.target("main.go", "caller");
    ctxplumb::run(&opts).unwrap();

    let out = repo.read("main.go");
    assert!(out.contains("func Callee(ctx context.Context) {"));
    assert!(out.contains("func caller(ctx context.Context) {\n\tCallee(ctx)\n}"));
    // main is past the boundary and stays untouched.
    assert!(out.contains("func main() {\n\tcaller(context.Background())\n}"));
}

#[test]
fn stop_at_without_handle_in_scope_fails() {
    let repo = TestRepo::new();
    repo.add_file(
        "main.go",
        "package main\n\nfunc Callee() {\n}\n\nfunc caller() {\n\tCallee()\n}\n\nfunc main() {\n\tcaller()\n}\n",
    );

    let mut opts = repo.opts(&repo.target("main.go", "Callee"));
    opts.stop_at = repo.target("main.go", "caller");
    let err = ctxplumb::run(&opts).unwrap_err();
    assert!(matches!(err, CtxPlumbError::BoundaryUnbindable { .. }));
}

// ============================================================================
// MODULE-WIDE REWRITE FROM A SUBDIRECTORY
// ============================================================================

#[test]
fn module_wide_rewrite_from_subdir() {
    let repo = TestRepo::new();
    repo.add_file(
        "sub/mylib.go",
        "package sub\n\nfunc FuncInNeedOfContext() {\n}\n",
    );
    repo.add_file(
        "main.go",
        "package main\n\nimport \"example.com/e2e/sub\"\n\nfunc main() {\n\tsub.FuncInNeedOfContext()\n}\n",
    );

    // Run from the subdirectory; callers outside of it must still be found.
    let mut opts = repo.opts(&repo.target("sub/mylib.go", "FuncInNeedOfContext"));
    opts.work_dir = repo.path().join("sub");
    ctxplumb::run(&opts).unwrap();

    assert!(repo
        .read("sub/mylib.go")
        .contains("func FuncInNeedOfContext(ctx context.Context) {"));
    let main_out = repo.read("main.go");
    assert!(main_out.contains("\tctx := context.Background()\n"));
    assert!(main_out.contains("\tsub.FuncInNeedOfContext(ctx)\n"));
}

// ============================================================================
// BUILD TAGS
// ============================================================================

#[test]
fn build_tagged_file_excluded_without_tag() {
    let repo = TestRepo::new();
    repo.add_file("main.go", "package main\n\nfunc Callee() {\n}\n\nfunc main() {\n\tCallee()\n}\n");
    repo.add_file(
        "extra.go",
        "//go:build integration\n\npackage main\n\nfunc integrationCaller() {\n\tCallee()\n}\n",
    );

    repo.run_target(&repo.target("main.go", "Callee")).unwrap();

    // The tagged file is not loaded, so its call site is untouched.
    assert!(repo.read("extra.go").contains("\tCallee()\n"));
    assert!(repo.read("main.go").contains("\tCallee(ctx)\n"));
}

#[test]
fn build_tagged_file_included_with_tag() {
    let repo = TestRepo::new();
    repo.add_file("main.go", "package main\n\nfunc Callee() {\n}\n\nfunc main() {\n\tCallee()\n}\n");
    repo.add_file(
        "extra.go",
        "//go:build integration\n\npackage main\n\nfunc integrationCaller() {\n\tCallee()\n}\n",
    );

    let mut opts = repo.opts(&repo.target("main.go", "Callee"));
    opts.tags = "integration".to_string();
    ctxplumb::run(&opts).unwrap();

    let extra = repo.read("extra.go");
    assert!(extra.contains("func integrationCaller(ctx context.Context) {"));
    assert!(extra.contains("\tCallee(ctx)\n"));
}

// ============================================================================
// ERROR SURFACE
// ============================================================================

#[test]
fn unknown_file_is_an_error() {
    let repo = TestRepo::new();
    repo.add_file("main.go", "package main\n\nfunc main() {\n}\n");

    let err = repo
        .run_target(&repo.target("nope.go", "Func"))
        .unwrap_err();
    assert!(matches!(err, CtxPlumbError::NoSuchFile { .. }));
}

#[test]
fn unknown_function_is_an_error() {
    let repo = TestRepo::new();
    repo.add_file("main.go", "package main\n\nfunc main() {\n}\n");

    let err = repo
        .run_target(&repo.target("main.go", "Missing"))
        .unwrap_err();
    assert!(matches!(err, CtxPlumbError::NoSuchFunction { .. }));
}

#[test]
fn line_mismatch_is_an_error() {
    let repo = TestRepo::new();
    repo.add_file("main.go", "package main\n\nfunc target() {\n}\n\nfunc main() {\n}\n");

    let target = format!("{}:99", repo.target("main.go", "target"));
    let err = repo.run_target(&target).unwrap_err();
    assert!(matches!(err, CtxPlumbError::LineMismatch { .. }));
}

#[test]
fn malformed_stop_at_is_an_error() {
    let repo = TestRepo::new();
    repo.add_file("main.go", "package main\n\nfunc target() {\n}\n\nfunc main() {\n}\n");

    let mut opts = repo.opts(&repo.target("main.go", "target"));
    opts.stop_at = "not a spec".to_string();
    let err = ctxplumb::run(&opts).unwrap_err();
    assert!(matches!(err, CtxPlumbError::InvalidSpec { .. }));
}
