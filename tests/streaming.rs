//! Windowed micro-batch engine, sequential and replicated.

use bramble::{ProcessGroup, ReplicatedStream, ThreadGroup, WindowStream};

#[test]
fn test_windows_fill_to_the_configured_size() {
    let mut stream = WindowStream::new(5);
    let mut source = (1_i64..=12).peekable();
    assert!(stream.fill_from(&mut source));
    assert_eq!(stream.window(), &[1, 2, 3, 4, 5]);
    assert_eq!(source.peek(), Some(&6));

    stream.rotate();
    assert!(stream.fill_from(&mut source));
    assert_eq!(stream.window(), &[6, 7, 8, 9, 10]);

    stream.rotate();
    // the source dries up before the third window fills
    assert!(!stream.fill_from(&mut source));
    assert_eq!(stream.window(), &[11, 12]);
    assert_eq!(stream.processed(), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[test]
fn test_direct_window_pipeline() {
    let data: Vec<i64> = vec![3, 8, 5, 12, 7, 2, 9, 4];

    let mut direct = WindowStream::new(4);
    let mut source = data.into_iter();
    let mut direct_totals = Vec::new();
    while direct.fill_from(&mut source) || !direct.window().is_empty() {
        direct.filter(|v| v % 2 == 0);
        direct.map(|v| v * 10);
        direct_totals.push(direct.reduce(|a, b| a + b, Some(0)));
        direct.rotate();
    }
    assert_eq!(direct_totals, vec![Some(200), Some(260)]);
    assert_eq!(direct.last_reduced(), Some(&260));
}

#[test]
fn test_replicated_stream_agrees_on_every_member() {
    let data: Vec<i64> = (1..=9).collect();
    let states = ThreadGroup::run(3, |group| {
        let mut stream = ReplicatedStream::new(&group, 4);
        stream.filter(|v: &i64| v % 2 == 0);
        stream.map(|v| v + 1);
        stream.reduce(|a, b| a + b, Some(0));

        let mut source = data.clone().into_iter();
        for _ in 0..3 {
            let arg = (group.rank() == 0).then_some(&mut source);
            stream.run_round(arg);
        }
        (
            stream.state().last_reduced().copied(),
            stream.state().processed().to_vec(),
        )
    });

    let first = states[0].clone();
    for state in &states {
        assert_eq!(state, &first);
    }
    // windows [1..4] -> [3,5] (8); [5..8] -> [7,9] (16 + 8 = 24);
    // [9] -> [] (24 carried)
    assert_eq!(first.0, Some(24));
    assert_eq!(first.1, vec![3, 5, 7, 9]);
}
