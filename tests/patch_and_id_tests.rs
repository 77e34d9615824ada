use review_range::PathPair;
use review_range::file_id::{self, ClientFileId};
use review_range::patch::{LineDiff, LinePatch, Operation, apply_patch, split_affix};

#[test]
fn file_id_round_trips_every_valid_form() {
    for text in [
        "9acf4124-e1eb-44cd-bdbb-f8c675bce872",
        "PROV_cGF0aABwYXRo",
        "PROV_cGF0aDEAcGF0aDI=",
    ] {
        let id = file_id::parse(text).unwrap();
        assert_eq!(file_id::write(&id), text, "round trip of {text}");
    }
}

#[test]
fn provisional_id_from_path_pair_decodes_back() {
    let id = ClientFileId::provisional(PathPair::new("old.txt", "new.txt"));
    let text = id.to_string();
    assert_eq!(text, "PROV_b2xkLnR4dABuZXcudHh0");
    assert_eq!(text.parse::<ClientFileId>().unwrap(), id);
}

fn lines(text: &[&str]) -> Vec<String> {
    text.iter().map(|s| s.to_string()).collect()
}

#[test]
fn successful_apply_means_context_matched_before_mutation() {
    let patch = LinePatch::new(
        2,
        2,
        vec![
            LineDiff::equal(["fn main() {"]),
            LineDiff::delete(["    old();"]),
            LineDiff::insert(["    new();"]),
            LineDiff::equal(["}"]),
        ],
    );
    let original = lines(&["// a", "", "fn main() {", "    old();", "}"]);

    let mut text = original.clone();
    assert!(apply_patch(&patch, &mut text));

    // every equal line sat at its expected offset in the original
    let mut offset = patch.start1;
    for diff in &patch.diffs {
        match diff.operation {
            Operation::Equal => {
                for line in &diff.lines {
                    assert_eq!(&original[offset], line);
                    offset += 1;
                }
            }
            Operation::Delete => offset += diff.lines.len(),
            Operation::Insert => {}
        }
    }
    assert_eq!(text, lines(&["// a", "", "fn main() {", "    new();", "}"]));
}

#[test]
fn drifted_context_is_reported_stale() {
    let patch = LinePatch::new(0, 0, vec![LineDiff::equal(["a"]), LineDiff::insert(["b"])]);
    let mut text = lines(&["x"]);
    assert!(!apply_patch(&patch, &mut text));
    assert_eq!(text, lines(&["x"]));
}

#[test]
fn affix_split_concatenates_back_to_diffs() {
    let patch = LinePatch::new(
        0,
        0,
        vec![
            LineDiff::equal(["a"]),
            LineDiff::equal(["b"]),
            LineDiff::delete(["c"]),
            LineDiff::insert(["C"]),
            LineDiff::equal(["d"]),
        ],
    );
    let split = split_affix(&patch).unwrap();

    assert!(split.prefix.iter().all(LineDiff::is_equal));
    assert!(split.suffix.iter().all(LineDiff::is_equal));

    let joined: Vec<LineDiff> = split
        .prefix
        .iter()
        .chain(&split.changes)
        .chain(&split.suffix)
        .cloned()
        .collect();
    assert_eq!(joined, patch.diffs);
}
