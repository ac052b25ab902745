#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use gatewatch_core::pipeline::LogParser;
use gatewatch_log_pipeline::decode_datagram;
use gatewatch_log_pipeline::parser::KeyValueParser;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 데이터그램 원본 바이트
    datagram: Vec<u8>,
    /// 파서 최대 입력 크기 (0 제외, 작게 제한)
    max_input_size: u16,
}

fuzz_target!(|input: FuzzInput| {
    let max = usize::from(input.max_input_size.max(1));
    let parser = KeyValueParser::new().with_max_input_size(max);

    let line = decode_datagram(&input.datagram);
    let record = parser.parse(&line);

    // 잘린 입력은 상한을 넘지 않는다
    assert!(record.raw.len() <= max);
    // 모든 키는 원문에 `key=` 형태로 존재한다
    for key in record.fields.keys() {
        assert!(record.raw.contains(&format!("{key}=")));
    }
});
