use deltadom::{Recorder, diff, parse_document};
use divan::{Bencher, black_box};

fn main() {
    divan::main();
}

/// A document with a table of `rows` rows and a list of `rows` items.
fn page(rows: usize, edit: impl Fn(usize) -> Option<String>) -> String {
    let mut html = String::from("<!DOCTYPE html><html><head><title>Bench</title></head><body>");
    html.push_str("<table><tbody>");
    for row in 0..rows {
        match edit(row) {
            Some(replacement) => html.push_str(&replacement),
            None => html.push_str(&format!(
                "<tr class=\"row\"><td>{row}</td><td>name {row}</td><td><a href=\"/{row}\">open</a></td></tr>"
            )),
        }
    }
    html.push_str("</tbody></table><ul>");
    for item in 0..rows {
        html.push_str(&format!("<li>item<br>{}</li>", item % 7));
    }
    html.push_str("</ul></body></html>");
    html
}

fn bench_diff(bencher: Bencher, old: &str, new: &str) {
    let after = parse_document(new);
    bencher.bench_local(|| {
        let mut before = parse_document(black_box(old));
        let recorder = diff(&mut before, black_box(&after), Recorder::new()).unwrap();
        black_box(recorder.operations);
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn unchanged(bencher: Bencher, rows: usize) {
    let html = page(rows, |_| None);
    bench_diff(bencher, &html, &html);
}

#[divan::bench(args = [10, 100, 1000])]
fn one_attribute(bencher: Bencher, rows: usize) {
    let old = page(rows, |_| None);
    let new = page(rows, |row| {
        (row == rows / 2).then(|| {
            format!(
                "<tr class=\"row selected\"><td>{row}</td><td>name {row}</td><td><a href=\"/{row}\">open</a></td></tr>"
            )
        })
    });
    bench_diff(bencher, &old, &new);
}

#[divan::bench(args = [10, 100, 1000])]
fn reversed_rows(bencher: Bencher, rows: usize) {
    let old = page(rows, |_| None);
    let new = page(rows, |row| {
        let row = rows - 1 - row;
        Some(format!(
            "<tr class=\"row\"><td>{row}</td><td>name {row}</td><td><a href=\"/{row}\">open</a></td></tr>"
        ))
    });
    bench_diff(bencher, &old, &new);
}

#[divan::bench(args = [10, 100, 1000])]
fn every_other_row_removed(bencher: Bencher, rows: usize) {
    let old = page(rows, |_| None);
    let new = page(rows, |row| (row % 2 == 1).then(String::new));
    bench_diff(bencher, &old, &new);
}
