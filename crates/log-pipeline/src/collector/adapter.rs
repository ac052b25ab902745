//! 전송 어댑터 -- 데이터그램 바이트를 파서 입력 텍스트로 변환합니다.
//!
//! 1. UTF-8로 디코딩 (잘못된 시퀀스는 U+FFFD로 치환)
//! 2. 앞뒤 공백 제거
//! 3. `<N>` 형태의 우선순위 헤더가 있으면 첫 `>`까지 제거
//! 4. 남은 본문의 앞뒤 공백 제거

/// 데이터그램 페이로드를 파서 입력 텍스트로 변환합니다.
///
/// 어떤 입력이든 실패하지 않습니다.
///
/// ```
/// use gatewatch_log_pipeline::collector::decode_datagram;
///
/// assert_eq!(decode_datagram(b"<189>date=2024-01-15 type=traffic\n"), "date=2024-01-15 type=traffic");
/// ```
pub fn decode_datagram(data: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(data);
    let text = decoded.trim();
    let body = match text.strip_prefix('<') {
        Some(rest) => match rest.find('>') {
            Some(end) => &rest[end + 1..],
            None => text,
        },
        None => text,
    };
    body.trim().to_owned()
}
