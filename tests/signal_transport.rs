use qtrader::integration::{SharedMemoryBlock, SignalEmitter, TickReplay, UdpSignalSender};
use qtrader::rl::evaluation::Evaluator;
use qtrader::rl::networks::LinearEstimator;
use qtrader::{Action, Signal, Tick};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;

fn series(n: usize) -> Vec<Tick> {
    (0..n)
        .map(|i| Tick::new(i as f64, "BTCUSDT", 1.0 + (i as f64 * 0.9).cos() * 0.05, 1.0))
        .collect()
}

#[tokio::test]
async fn replayed_feed_reaches_udp_and_shared_memory() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let udp = UdpSignalSender::bind(receiver.local_addr().unwrap())
        .await
        .unwrap();

    let shm_path = std::env::temp_dir().join("qtrader_it_signal_shm");
    let _ = std::fs::remove_file(&shm_path);
    let block = SharedMemoryBlock::open_or_create(&shm_path, 1024).unwrap();

    let mut rng = StdRng::seed_from_u64(21);
    let estimator = LinearEstimator::new(0.01, &mut rng).unwrap();
    let ticks = series(30);
    let expected: Vec<Action> = Evaluator::new(estimator.clone())
        .policy_actions(&ticks)
        .into_iter()
        .filter(|a| *a != Action::Hold)
        .collect();

    let mut emitter = SignalEmitter::new(Evaluator::new(estimator), "BTCUSDT", 0.01)
        .with_sink(Box::new(udp))
        .with_sink(Box::new(block.clone()));
    let (rx, feed) = TickReplay::new(ticks, 1).spawn(4);
    let (_stop, shutdown) = watch::channel(false);
    let stats = emitter.run(rx, shutdown).await.unwrap();
    feed.await.unwrap();

    assert_eq!(stats.ticks, 30);
    assert_eq!(stats.signals as usize, expected.len());
    assert_eq!(stats.send_failures, 0);

    let mut received = Vec::new();
    let mut buf = [0u8; 256];
    for _ in 0..expected.len() {
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("datagram within timeout")
            .unwrap();
        let signal: Signal = serde_json::from_slice(&buf[..len]).unwrap();
        received.push(signal.action);
    }
    assert_eq!(received, expected);

    let last: Option<Signal> = block.read_message().unwrap();
    assert_eq!(last.map(|s| s.action), expected.last().copied());
    block.unlink().unwrap();
}
