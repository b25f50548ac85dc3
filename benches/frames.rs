/// Benchmarks for the per-frame hot path: decoding inbound frames, parsing
/// responses and events, and diffing subscription sets.
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pylon_client::subscription::Delta;
use pylon_client::types::response::PylonEvent;
use pylon_client::ws::frame::{InboundFrame, OutboundFrame, RpcRequest, RpcResponse};
use serde_json::json;

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("frames");

    let ping = br#"["ping"]"#;
    group.throughput(Throughput::Bytes(ping.len() as u64));
    group.bench_function("decode/ping", |b| {
        b.iter(|| {
            let frame = InboundFrame::decode(std::hint::black_box(ping))
                .expect("Decoding should succeed");
            assert!(frame.is_ping(), "ping frame");
        });
    });

    let response = br#"["response", {"id": 42, "result": {"success": true, "gasUsed": "0x5208"}}]"#;
    group.throughput(Throughput::Bytes(response.len() as u64));
    group.bench_function("decode/response", |b| {
        b.iter(|| {
            let frame = InboundFrame::decode(std::hint::black_box(response))
                .expect("Decoding should succeed");
            RpcResponse::parse(frame.payload).expect("Parsing should succeed")
        });
    });

    let balances = json!(["event", {
        "type": "balances",
        "meta": { "account": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266", "finished": true },
        "data": (0..50).map(|i| json!({
            "contract": format!("0x{i:040x}"),
            "chainId": 1,
            "amount": "0xde0b6b3a7640000"
        })).collect::<Vec<_>>()
    }])
    .to_string();
    group.throughput(Throughput::Bytes(balances.len() as u64));
    group.bench_function("decode/balances_event", |b| {
        b.iter(|| {
            let frame = InboundFrame::decode(std::hint::black_box(balances.as_bytes()))
                .expect("Decoding should succeed");
            let _: PylonEvent =
                serde_json::from_value(frame.payload).expect("Deserialization should succeed");
        });
    });

    let request = OutboundFrame::Request(RpcRequest::new(
        7,
        "simulateTransaction",
        json!({ "chainId": 1, "from": "0x1234", "to": "0xabcd", "value": "0x0" }),
    ));
    group.bench_function("encode/request", |b| {
        b.iter(|| std::hint::black_box(&request).encode().expect("Encoding should succeed"));
    });

    group.finish();
}

fn bench_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscription/delta");

    for size in [10_usize, 100, 500] {
        let current: Vec<String> = (0..size).map(|i| format!("0x{i:040x}")).collect();
        // Half overlap with the current set
        let desired: Vec<String> = (size / 2..size + size / 2)
            .map(|i| format!("0x{i:040x}"))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                Delta::between(
                    std::hint::black_box(&current),
                    std::hint::black_box(&desired),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frames, bench_delta);
criterion_main!(benches);
