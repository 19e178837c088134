use colv::row::{FieldMatch, FormatRule, Row};
use colv::rules::IgnoreRule;
use colv::source::MappedSource;
use colv::{Direction, LineCache, SearchPattern, SourceFactory};
use proptest::prelude::*;

/// `count` lines of three blank-separated fields.
fn numbered(count: usize) -> String {
    (0..count)
        .map(|i| format!("{i} item{i} {}\n", i * 7 % 13))
        .collect()
}

/// Start offset of every line in `text`, including a final partial line.
fn line_offsets(text: &str) -> Vec<u64> {
    let mut offsets = vec![0];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' && i + 1 < text.len() {
            offsets.push(i as u64 + 1);
        }
    }
    offsets
}

fn assert_window(cache: &LineCache, offsets: &[u64]) {
    let pos = cache.position();
    assert!(pos.off <= pos.off2, "{pos:?}");
    assert!(pos.line <= pos.line2, "{pos:?}");
    assert_eq!(pos.line2 - pos.line, cache.len() as u64, "{pos:?}");
    if let Some(&start) = offsets.get(pos.line as usize) {
        assert_eq!(start, pos.off, "{pos:?}");
    }
    for (i, row) in cache.rows().iter().enumerate() {
        assert_eq!(row.offset(), offsets[pos.line as usize + i]);
    }
}

async fn open(text: &str) -> (tempfile::NamedTempFile, LineCache) {
    let file = tempfile::NamedTempFile::new().expect("create temp file");
    std::fs::write(file.path(), text).expect("write contents");
    let source = SourceFactory::open(file.path()).await.expect("open source");
    (file, LineCache::new(source))
}

#[tokio::test]
async fn scroll_zero_changes_nothing() {
    let (_file, mut cache) = open(&numbered(100)).await;
    cache.goto_line(30).unwrap();
    cache.cache_fill(20).unwrap();

    let before = (cache.position(), cache.rows().clone());
    cache.scroll(0).unwrap();
    assert_eq!(before, (cache.position(), cache.rows().clone()));
}

#[tokio::test]
async fn scroll_there_and_back() {
    let text = numbered(200);
    let offsets = line_offsets(&text);
    let (_file, mut cache) = open(&text).await;
    cache.goto_line(11).unwrap();
    cache.cache_fill(20).unwrap();
    let start = cache.position();

    for k in [1, 5, 19, 20, 50, 150] {
        cache.scroll(k).unwrap();
        assert_eq!(cache.current_line(), 10 + k as u64);
        assert_window(&cache, &offsets);
        cache.scroll(-k).unwrap();
        assert_eq!(cache.position(), start, "k = {k}");
    }
}

#[tokio::test]
async fn scrolling_is_clamped_at_both_ends() {
    let text = numbered(30);
    let offsets = line_offsets(&text);
    let (_file, mut cache) = open(&text).await;
    cache.cache_fill(10).unwrap();

    cache.scroll(-5).unwrap();
    assert_eq!(cache.current_line(), 0);
    cache.scroll(1000).unwrap();
    assert_eq!(cache.current_line(), 29);
    assert_window(&cache, &offsets);
}

#[test]
fn goto_percent_spans_the_file() {
    let mut cache = LineCache::new(MappedSource::from_bytes(numbered(10)));
    cache.cache_fill(3).unwrap();

    cache.goto_percent(0.0).unwrap();
    assert_eq!(cache.current_line(), 0);
    cache.goto_percent(100.0).unwrap();
    assert_eq!(cache.current_line(), 9);
    // line 5 counted from 1
    cache.goto_percent(50.0).unwrap();
    assert_eq!(cache.current_line(), 4);
    cache.goto_percent(120.0).unwrap();
    assert_eq!(cache.current_line(), 9);
}

#[tokio::test]
async fn goto_offset_then_scroll_evicts_old_top() {
    let text = numbered(1000);
    let offsets = line_offsets(&text);
    let (_file, mut cache) = open(&text).await;
    cache.cache_fill(20).unwrap();

    cache.goto_offset(offsets[500]).unwrap();
    cache.cache_fill(20).unwrap();
    assert_eq!(cache.current_line(), 500);

    cache.scroll(1).unwrap();
    assert_eq!(cache.current_line(), 501);
    assert_eq!(cache.rows()[0].offset(), offsets[501]);
    assert_eq!(cache.len(), 20);
    assert_window(&cache, &offsets);
}

#[tokio::test]
async fn search_finds_visible_row_then_reports_exhaustion() {
    let text: String = (0..40)
        .map(|i| match i {
            7 | 30 => format!("{i} needle here\n"),
            _ => format!("{i} hay here\n"),
        })
        .collect();
    let (_file, mut cache) = open(&text).await;
    cache.cache_fill(20).unwrap();

    let pattern = SearchPattern::new("needle", false).unwrap();
    assert!(cache.search(pattern, Direction::Forward).unwrap());
    assert_eq!(cache.current_line(), 7);
    let Row::Fields(row) = &cache.rows()[0] else {
        panic!("expected a field row");
    };
    assert_eq!(row.field_match(1), Some(&FieldMatch::Span(0..6)));
    assert!(row.field_match(0).is_none());

    assert!(cache.repeat_search(Direction::Forward).unwrap());
    assert_eq!(cache.current_line(), 30);
    cache.cache_fill(20).unwrap();
    assert!(cache.rows()[0].has_match());

    let before = cache.position();
    assert!(!cache.repeat_search(Direction::Forward).unwrap());
    assert_eq!(cache.position(), before);
}

/// 100 lines with `needle` on lines 10 and 40.
fn two_needles() -> String {
    (0..100)
        .map(|i| match i {
            10 | 40 => format!("{i} needle here\n"),
            _ => format!("{i} hay here\n"),
        })
        .collect()
}

#[tokio::test]
async fn backward_search_in_window_puts_match_at_bottom() {
    let (_file, mut cache) = open(&two_needles()).await;
    cache.goto_line(31).unwrap();
    cache.cache_fill(20).unwrap();

    let pattern = SearchPattern::new("needle", false).unwrap();
    assert!(cache.search(pattern, Direction::Backward).unwrap());
    assert_eq!(cache.current_line(), 21);
    assert_eq!(cache.len(), 20);
    assert!(cache.rows().back().unwrap().has_match());
    assert_window(&cache, &line_offsets(&two_needles()));
}

#[tokio::test]
async fn backward_search_scans_above_the_window() {
    let text = two_needles();
    let offsets = line_offsets(&text);
    let (_file, mut cache) = open(&text).await;
    cache.goto_line(81).unwrap();
    cache.cache_fill(20).unwrap();

    let pattern = SearchPattern::new("needle", false).unwrap();
    assert!(cache.search(pattern, Direction::Backward).unwrap());
    cache.cache_fill(20).unwrap();
    assert_eq!(cache.current_line(), 21);
    assert_eq!(cache.position().line2, 41);
    assert!(cache.rows().back().unwrap().has_match());
    assert_window(&cache, &offsets);

    // the earlier match cannot reach the bottom row, so the window clamps at the top
    assert!(cache.repeat_search(Direction::Backward).unwrap());
    cache.cache_fill(20).unwrap();
    assert_eq!(cache.current_line(), 0);
    assert!(cache.rows()[10].has_match());
    assert!(!cache.rows()[9].has_match());
    assert_window(&cache, &offsets);
}

#[tokio::test]
async fn backward_search_without_match_stays_put() {
    let (_file, mut cache) = open(&two_needles()).await;
    cache.goto_line(61).unwrap();
    cache.cache_fill(20).unwrap();
    let before = cache.position();

    let pattern = SearchPattern::new("absent", false).unwrap();
    assert!(!cache.search(pattern, Direction::Backward).unwrap());
    assert_eq!(cache.position(), before);
    assert!(!cache.repeat_search(Direction::Backward).unwrap());
    assert_eq!(cache.position(), before);
}

#[test]
fn ignore_rule_round_trip_restores_fields() {
    let text = "1 INFO start\n2 DEBUG noise\n3 INFO done\n";
    let mut cache = LineCache::new(MappedSource::from_bytes(text));
    cache.cache_fill(3).unwrap();
    let before = cache.rows().clone();

    let rule = IgnoreRule::parse("DEBUG").unwrap();
    assert!(cache.add_ignore_rule(rule.clone()).unwrap());
    assert!(cache.rows()[1].is_ignored());
    assert!(!cache.rows()[0].is_ignored());

    assert!(cache.remove_ignore_rule(&rule).unwrap());
    assert_eq!(cache.rows(), &before);
}

#[test]
fn formatted_field_still_matches_original_text() {
    let mut cache = LineCache::new(MappedSource::from_bytes("pi 3.14159\ne 2.71828\n"));
    cache.set_format_rule(1, FormatRule::parse("%.1f").unwrap()).unwrap();
    cache.cache_fill(2).unwrap();

    let Row::Fields(row) = &cache.rows()[0] else {
        panic!("expected a field row");
    };
    assert_eq!(row.fields()[1], "3.1");

    let pattern = SearchPattern::new("159$", false).unwrap();
    assert!(cache.search(pattern, Direction::Forward).unwrap());
    assert_eq!(cache.current_line(), 0);
    let Row::Fields(row) = &cache.rows()[0] else {
        panic!("expected a field row");
    };
    assert_eq!(row.field_match(1), Some(&FieldMatch::Whole));
    assert!(!cache.rows()[1].has_match());
}

#[test]
fn goto_end_shows_final_partial_line() {
    let mut cache = LineCache::new(MappedSource::from_bytes("a 1\nb 2\nc 3\nd 4\ne 5"));
    cache.cache_fill(2).unwrap();

    cache.goto_end().unwrap();
    cache.cache_fill(2).unwrap();
    assert_eq!(cache.current_line(), 3);
    let Row::Fields(row) = &cache.rows()[1] else {
        panic!("expected a field row");
    };
    assert_eq!(row.fields(), ["e", "5"]);
}

#[derive(Debug, Clone)]
enum Op {
    Scroll(i64),
    Line(u64),
    Percent(f64),
    Offset(u64),
    Start,
    End,
    Fill(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-60i64..60).prop_map(Op::Scroll),
        (1u64..130).prop_map(Op::Line),
        (0.0f64..=100.0).prop_map(Op::Percent),
        (0u64..4000).prop_map(Op::Offset),
        Just(Op::Start),
        Just(Op::End),
        (0usize..25).prop_map(Op::Fill),
    ]
}

proptest! {
    #[test]
    fn random_navigation_keeps_window_consistent(
        lines in 1usize..120,
        trailing_newline in any::<bool>(),
        ops in prop::collection::vec(op(), 1..40),
    ) {
        let mut text = numbered(lines);
        if !trailing_newline {
            text.pop();
        }
        let offsets = line_offsets(&text);
        let mut cache = LineCache::new(MappedSource::from_bytes(text.clone()));
        cache.cache_fill(10).unwrap();

        for op in ops {
            let result = match op.clone() {
                Op::Scroll(delta) => cache.scroll(delta),
                Op::Line(n) => cache.goto_line(n),
                Op::Percent(p) => cache.goto_percent(p),
                Op::Offset(offset) => cache.goto_offset(offset),
                Op::Start => {
                    cache.goto_start();
                    Ok(())
                }
                Op::End => cache.goto_end(),
                Op::Fill(n) => cache.cache_fill(n),
            };
            prop_assert!(result.is_ok(), "{op:?}: {result:?}");
            assert_window(&cache, &offsets);
            prop_assert!((cache.current_line() as usize) < offsets.len());
        }
    }
}
