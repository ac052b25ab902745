//! 카운터 테이블과 통계 스냅샷 타입
//!
//! [`OrderedTable`]은 키가 처음 관측된 순서를 기억합니다.
//! 순위를 매길 때 횟수가 같으면 먼저 관측된 키가 앞에 옵니다.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// 순위 목록 길이
pub const TOP_N: usize = 10;

/// 처음 관측된 순서를 기억하는 문자열 키 테이블
#[derive(Debug, Clone)]
pub struct OrderedTable<V> {
    index: HashMap<String, usize>,
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedTable<V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<V: Default> OrderedTable<V> {
    /// 키의 값을 가변 참조로 반환합니다. 없으면 기본값으로 추가합니다.
    pub fn entry_mut(&mut self, key: &str) -> &mut V {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.entries.push((key.to_owned(), V::default()));
                self.index.insert(key.to_owned(), idx);
                idx
            }
        };
        &mut self.entries[idx].1
    }
}

impl<V> OrderedTable<V> {
    /// 키의 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    /// 키 개수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 관측 순서대로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `weight` 내림차순 상위 `n`개를 반환합니다. 동점이면 관측 순서를 따릅니다.
    pub fn top_by<F>(&self, n: usize, weight: F) -> Vec<(&str, &V)>
    where
        F: Fn(&V) -> u64,
    {
        let mut ranked: Vec<(&str, &V)> = self.iter().collect();
        // sort_by는 안정 정렬
        ranked.sort_by(|a, b| weight(b.1).cmp(&weight(a.1)));
        ranked.truncate(n);
        ranked
    }
}

/// 키별 횟수 테이블
pub type CountTable = OrderedTable<u64>;

impl CountTable {
    /// 키의 횟수를 1 증가시킵니다.
    pub fn increment(&mut self, key: &str) {
        *self.entry_mut(key) += 1;
    }

    /// 키의 횟수를 반환합니다. 없으면 0입니다.
    pub fn count(&self, key: &str) -> u64 {
        self.get(key).copied().unwrap_or(0)
    }

    /// 횟수 상위 `n`개를 `(키, 횟수)`로 반환합니다.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        self.top_by(n, |c| *c)
            .into_iter()
            .map(|(k, c)| (k.to_owned(), *c))
            .collect()
    }

    /// 전체를 키 정렬된 맵으로 복사합니다.
    pub fn to_map(&self) -> BTreeMap<String, u64> {
        self.iter().map(|(k, c)| (k.to_owned(), *c)).collect()
    }
}

/// 차단 사이트 하나의 누적 정보
#[derive(Debug, Clone, Default)]
pub struct BlockedSite {
    /// 차단 횟수
    pub hits: u64,
    /// 출발지 IP별 횟수
    pub sources: CountTable,
}

/// 차단 카테고리 하나의 누적 정보
///
/// `sources`는 출발지 IP -> 목적지 -> 횟수의 중첩 구조입니다.
#[derive(Debug, Clone, Default)]
pub struct BlockedCategory {
    /// 차단 횟수
    pub hits: u64,
    /// 출발지별 목적지 횟수
    pub sources: OrderedTable<CountTable>,
}

impl BlockedCategory {
    /// `(출발지, 목적지, 횟수)` 상위 `n`개를 반환합니다.
    ///
    /// 동점이면 출발지 관측 순서, 같은 출발지 안에서는 목적지 관측 순서를 따릅니다.
    pub fn top_triples(&self, n: usize) -> Vec<(String, String, u64)> {
        let mut triples: Vec<(&str, &str, u64)> = self
            .sources
            .iter()
            .flat_map(|(src, dests)| dests.iter().map(move |(dest, c)| (src, dest, *c)))
            .collect();
        triples.sort_by(|a, b| b.2.cmp(&a.2));
        triples.truncate(n);
        triples
            .into_iter()
            .map(|(s, d, c)| (s.to_owned(), d.to_owned(), c))
            .collect()
    }
}

/// 차단 사이트 상세 (순위 항목)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSiteDetail {
    /// 사이트 (hostname 또는 dstip)
    pub site: String,
    /// 차단 횟수
    pub count: u64,
    /// 상위 출발지 `[srcip, count]`
    pub sources: Vec<(String, u64)>,
}

/// 차단 카테고리 상세 (순위 항목)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedCategoryDetail {
    /// 카테고리 (`catdesc` 또는 `"Other"`)
    pub category: String,
    /// 차단 횟수
    pub count: u64,
    /// 상위 `[srcip, destination, count]`
    pub sources: Vec<(String, String, u64)>,
}

/// 어플라이언스 하나의 집계 통계 스냅샷
///
/// 집계기 잠금을 잡은 상태에서 한 번에 만들어지므로 필드 간 일관성이 보장됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// 전체 레코드 수
    pub total_logs: u64,
    /// 차단 판정 수
    pub blocked_count: u64,
    /// 허용 판정 수
    pub allowed_count: u64,
    /// action별 횟수
    pub by_action: BTreeMap<String, u64>,
    /// 카테고리별 횟수
    pub by_type: BTreeMap<String, u64>,
    /// 상위 출발지 `[srcip, count]`
    pub top_sources: Vec<(String, u64)>,
    /// 상위 목적지 `[destination, count]`
    pub top_destinations: Vec<(String, u64)>,
    /// 상위 차단 사이트 `[site, count]`
    pub top_blocked: Vec<(String, u64)>,
    /// 상위 차단 카테고리 `[category, count]`
    pub top_blocked_categories: Vec<(String, u64)>,
    /// 상위 차단 사이트별 출발지
    pub top_blocked_detail: Vec<BlockedSiteDetail>,
    /// 상위 차단 카테고리별 출발지/목적지
    pub top_blocked_categories_detail: Vec<BlockedCategoryDetail>,
}
