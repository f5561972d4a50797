use divan::{Bencher, black_box};
use sapling::Document;

fn main() {
    divan::main();
}

fn catalog(n: usize) -> Document {
    let mut xml = String::from("<all_item>");
    for i in 0..n {
        xml.push_str(&format!("<item n=\"{i}\"><title>item{i}</title></item>"));
    }
    xml.push_str("</all_item>");
    match sapling::parse_xml(&xml) {
        Ok(doc) => doc,
        Err(err) => panic!("bench input must parse: {err}"),
    }
}

#[divan::bench(args = [10, 100, 1000])]
fn css_all(bencher: Bencher, n: usize) {
    let doc = catalog(n);
    bencher.bench_local(|| black_box(doc.css(black_box("all_item > item title"))));
}

#[divan::bench(args = [10, 100, 1000])]
fn at_css_last(bencher: Bencher, n: usize) {
    let doc = catalog(n);
    bencher.bench_local(|| black_box(doc.at_css(black_box("item:last-child"))));
}

/// Move the last item to the front, over and over.
#[divan::bench(args = [10, 100, 1000])]
fn rotate_children(bencher: Bencher, n: usize) {
    let mut doc = catalog(n);
    let Some(root) = doc.root_element() else {
        return;
    };
    bencher.bench_local(|| {
        let last = doc.children(root).last();
        if let Some(last) = last {
            let _ = doc.insert_child(root, last, 0);
        }
    });
}

/// Insert an imported item in the middle, then take it out again.
#[divan::bench(args = [10, 100, 1000])]
fn insert_and_remove(bencher: Bencher, n: usize) {
    let mut doc = catalog(n);
    let Ok(source) = sapling::parse_xml("<item>added</item>") else {
        return;
    };
    let (Some(root), Some(item)) = (doc.root_element(), source.root_element()) else {
        return;
    };
    let Ok(added) = doc.import(&source, item) else {
        return;
    };
    bencher.bench_local(|| {
        let _ = doc.insert_child(root, added, n / 2);
        let _ = doc.remove(added);
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn swap_siblings(bencher: Bencher, n: usize) {
    let mut doc = catalog(n);
    let Ok(items) = doc.css("item") else {
        return;
    };
    let (Some(&first), Some(&second)) = (items.first(), items.get(1)) else {
        return;
    };
    bencher.bench_local(|| {
        let _ = doc.add_next_sibling(second, first);
        let _ = doc.add_next_sibling(first, second);
    });
}
