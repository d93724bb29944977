use assert_cmd::Command;
use predicates::prelude::*;

const BOOKSTORE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bookstore.json");
const BOOKSTORE_YAML: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bookstore.yaml");
const MATH_OPTIONS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/math.yaml");

fn jpq() -> Command {
    Command::cargo_bin("jpq").unwrap()
}

#[test]
fn authors_one_per_line() {
    jpq()
        .args(["-c", "$.store.book[*].author", BOOKSTORE])
        .assert()
        .success()
        .stdout("\"Nigel Rees\"\n\"Evelyn Waugh\"\n\"Herman Melville\"\n\"J. R. R. Tolkien\"\n");
}

#[test]
fn raw_strings() {
    jpq()
        .args(["-r", "$..book[?(@.isbn)].title", BOOKSTORE])
        .assert()
        .success()
        .stdout("Moby Dick\nThe Lord of the Rings\n");
}

#[test]
fn first_match_only() {
    jpq()
        .args(["-r", "--first", "$..author", BOOKSTORE])
        .assert()
        .success()
        .stdout("Nigel Rees\n");
}

#[test]
fn locations() {
    jpq()
        .args(["--paths", "$..book[?(@.price<10)]", BOOKSTORE])
        .assert()
        .success()
        .stdout("/store/book/0\n/store/book/2\n");

    jpq()
        .args(["--paths", "--normalized", "$.store.bicycle.*", BOOKSTORE])
        .assert()
        .success()
        .stdout("$['store']['bicycle']['color']\n$['store']['bicycle']['price']\n");
}

#[test]
fn locations_with_values() {
    jpq()
        .args(["-c", "--with-paths", "$.store.bicycle.color", BOOKSTORE])
        .assert()
        .success()
        .stdout("{\"path\":\"/store/bicycle/color\",\"value\":\"red\"}\n");
}

#[test]
fn yaml_input_and_output() {
    jpq()
        .args(["-o", "yaml", "$.store.bicycle", BOOKSTORE_YAML])
        .assert()
        .success()
        .stdout(predicate::str::contains("color: red"));
}

#[test]
fn stdin_format_is_sniffed() {
    jpq()
        .arg("$.a.b")
        .write_stdin("a:\n  b: 1\n")
        .assert()
        .success()
        .stdout("1\n");

    jpq()
        .args(["-c", "$[1]"])
        .write_stdin("[true, false]")
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn json_lines() {
    jpq()
        .args(["--jsonl", "$.a"])
        .write_stdin("{\"a\":1}\n\n{\"b\":0}\n{\"a\":2}\n")
        .assert()
        .success()
        .stdout("1\n2\n");
}

#[test]
fn pointer_for_singular_path() {
    jpq()
        .args(["--pointer", "$.store['book'][0]"])
        .assert()
        .success()
        .stdout("/store/book/0\n");

    jpq()
        .args(["--pointer", "$..x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("descendant"));
}

#[test]
fn syntax_error_reports_position() {
    jpq()
        .args(["$.store[", BOOKSTORE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("position 8"));
}

#[test]
fn math_needs_opt_in() {
    let path = "$..book[?@.price * 2 < 20].author";
    jpq().args([path, BOOKSTORE]).assert().failure();

    jpq()
        .args(["-r", "--math", path, BOOKSTORE])
        .assert()
        .success()
        .stdout("Nigel Rees\nHerman Melville\n");

    jpq()
        .args(["-r", "--options", MATH_OPTIONS, path, BOOKSTORE])
        .assert()
        .success()
        .stdout("Nigel Rees\nHerman Melville\n");
}

#[test]
fn in_operator_with_literal_array() {
    jpq()
        .args([
            "-r",
            "--in",
            "--json-constructs",
            "$..book[?@.author in ['Nigel Rees', 'Nobody']].title",
            BOOKSTORE,
        ])
        .assert()
        .success()
        .stdout("Sayings of the Century\n");
}

#[test]
fn relative_start() {
    jpq()
        .args(["-r", "--relative", "@.store.bicycle.color", BOOKSTORE])
        .assert()
        .success()
        .stdout("red\n");
}

#[test]
fn missing_file_fails() {
    jpq()
        .args(["$", "/nonexistent/doc.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading /nonexistent/doc.json"));
}
