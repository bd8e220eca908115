//! Keyword trends - Naver DataLab search-trend proxy with an offline fallback
//!
//! With credentials the service asks DataLab for search ratios and turns them
//! into keyword scores. Without credentials, or when the API call fails for any
//! reason, it answers from a fixed sample table so callers always get data.

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::core::util::round2;

pub const DATALAB_BASE_URL: &str = "https://openapi.naver.com/v1/datalab";

/// Days covered when the caller gives no date range
const DEFAULT_RANGE_DAYS: i64 = 30;

/// Trailing data points averaged into a keyword's trend
const RECENT_POINTS: usize = 7;

/// Maximum keywords returned from the sample table
const MAX_SAMPLE_RESULTS: usize = 15;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Competition {
    High,
    Medium,
    Low,
}

impl Competition {
    fn from_trend(trend: f64) -> Self {
        if trend > 80.0 {
            Self::High
        } else if trend > 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One ratio sample from DataLab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub period: String,
    pub ratio: f64,
}

/// Scored keyword, shaped for a word-cloud front end
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordTrend {
    pub text: String,
    /// Cloud weight
    pub value: u64,
    pub search_volume: u64,
    pub trend: f64,
    pub competition: Competition,
    pub cpc: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_points: Option<Vec<DataPoint>>,
}

impl KeywordTrend {
    fn sample(
        text: &str,
        value: u64,
        search_volume: u64,
        trend: f64,
        competition: Competition,
        cpc: f64,
    ) -> Self {
        Self {
            text: text.to_string(),
            value,
            search_volume,
            trend,
            competition,
            cpc,
            data_points: None,
        }
    }

    /// Estimate a keyword's scores from its DataLab ratios
    fn from_points(text: String, points: Vec<DataPoint>) -> Self {
        let recent = &points[points.len().saturating_sub(RECENT_POINTS)..];
        let trend = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(|p| p.ratio).sum::<f64>() / recent.len() as f64
        };

        Self {
            text,
            value: (trend * 10.0) as u64,
            search_volume: (trend * 10_000.0) as u64,
            trend,
            competition: Competition::from_trend(trend),
            cpc: round2(trend / 20.0),
            data_points: Some(points),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    #[serde(default)]
    data: Vec<DataPoint>,
}

/// DataLab client credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Both halves must be present and non-empty
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
        match (client_id, client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(Self {
                client_id: id,
                client_secret: secret,
            }),
            _ => None,
        }
    }
}

/// Keyword trend service
#[derive(Debug, Clone)]
pub struct TrendService {
    client: Client,
    credentials: Option<Credentials>,
    base_url: String,
}

impl TrendService {
    pub fn new(credentials: Option<Credentials>) -> Result<Self> {
        Self::with_base_url(credentials, DATALAB_BASE_URL)
    }

    pub fn with_base_url(credentials: Option<Credentials>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("audiocache/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        match &credentials {
            Some(_) => tracing::info!("DataLab credentials set; keyword trends use the live API"),
            None => tracing::warn!("DataLab credentials missing; keyword trends use sample data"),
        }

        Ok(Self {
            client,
            credentials,
            base_url: base_url.into(),
        })
    }

    pub fn is_live(&self) -> bool {
        self.credentials.is_some()
    }

    /// Trend scores for `keywords`, falling back to sample data on any failure.
    ///
    /// Dates are `YYYY-MM-DD`; the range defaults to the last 30 days.
    pub async fn search_trends(
        &self,
        keywords: &[String],
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Vec<KeywordTrend> {
        let Some(credentials) = &self.credentials else {
            return sample_trends(keywords);
        };

        match self.fetch_trends(credentials, keywords, start_date, end_date).await {
            Ok(trends) => trends,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "DataLab request failed; using sample data");
                sample_trends(keywords)
            }
        }
    }

    async fn fetch_trends(
        &self,
        credentials: &Credentials,
        keywords: &[String],
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<KeywordTrend>> {
        let today = Utc::now().date_naive();
        let start = start_date.map(str::to_string).unwrap_or_else(|| {
            (today - ChronoDuration::days(DEFAULT_RANGE_DAYS))
                .format("%Y-%m-%d")
                .to_string()
        });
        let end = end_date
            .map(str::to_string)
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

        let body = json!({
            "startDate": start,
            "endDate": end,
            "timeUnit": "date",
            "keywordGroups": keywords
                .iter()
                .map(|k| json!({ "groupName": k, "keywords": [k], "device": "pc,mo" }))
                .collect::<Vec<_>>(),
        });

        let url = format!("{}/search", self.base_url);
        tracing::debug!(%url, count = keywords.len(), "requesting DataLab search trends");

        let response = self
            .client
            .post(&url)
            .header("X-Naver-Client-Id", &credentials.client_id)
            .header("X-Naver-Client-Secret", &credentials.client_secret)
            .json(&body)
            .send()
            .await
            .context("DataLab request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("DataLab returned HTTP {}: {}", status, detail.trim());
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse DataLab response")?;
        Ok(score_results(parsed))
    }

    /// Trends for `keyword` plus up to `max_related` related keywords
    pub async fn search_trends_with_related(
        &self,
        keyword: &str,
        include_related: bool,
        max_related: usize,
    ) -> Vec<KeywordTrend> {
        let mut keywords = vec![keyword.to_string()];
        if include_related {
            keywords.extend(related_keywords(keyword).into_iter().take(max_related));
        }
        self.search_trends(&keywords, None, None).await
    }

    /// Shopping insight keywords. DataLab's shopping endpoint is not wired up,
    /// so this always serves the sample table.
    pub fn shopping_insights(&self) -> Vec<KeywordTrend> {
        sample_shopping()
    }
}

fn score_results(response: SearchResponse) -> Vec<KeywordTrend> {
    let mut trends: Vec<KeywordTrend> = response
        .results
        .into_iter()
        .filter(|result| !result.data.is_empty())
        .map(|result| KeywordTrend::from_points(result.title, result.data))
        .collect();
    sort_by_trend(&mut trends);
    trends
}

fn sort_by_trend(trends: &mut [KeywordTrend]) {
    trends.sort_by(|a, b| b.trend.total_cmp(&a.trend));
}

/// Keywords related to `keyword`: a curated list for known topics, otherwise
/// the keyword with common search suffixes.
pub fn related_keywords(keyword: &str) -> Vec<String> {
    let curated: &[&str] = match keyword {
        "건강" => &[
            "건강식품", "건강검진", "건강보험", "건강관리", "건강한생활", "운동", "다이어트",
            "영양", "비타민", "보조식품", "헬스", "피트니스", "요가", "명상", "스트레스", "수면",
            "면역력", "체중관리", "혈압", "혈당",
        ],
        "운동" => &[
            "헬스", "피트니스", "요가", "러닝", "걷기", "수영", "등산", "자전거", "홈트레이닝",
            "스트레칭", "근력운동", "유산소운동", "다이어트", "체중감량", "근육", "체력", "지구력",
            "유연성", "균형감각", "코어운동",
        ],
        "다이어트" => &[
            "체중감량", "다이어트식품", "칼로리", "운동", "건강", "영양", "단백질", "탄수화물",
            "지방", "식단관리", "간헐적단식", "저탄고지", "채식", "건강식품", "보조식품",
            "체지방률", "기초대사량", "운동효과", "식사시간", "수분섭취",
        ],
        "영양" => &[
            "비타민", "미네랄", "단백질", "탄수화물", "지방", "식이섬유", "항산화제", "오메가3",
            "프로바이오틱스", "칼슘", "철분", "마그네슘", "아연", "셀레늄", "비타민C", "비타민D",
            "비타민B", "엽산", "콜라겐", "글루타민",
        ],
        "수면" => &[
            "불면증", "수면의질", "수면시간", "수면환경", "수면습관", "수면장애", "코골이",
            "무호흡증", "수면부족", "피로", "스트레스", "명상", "이완법", "수면제", "수면보조제",
            "수면리듬", "생체리듬", "멜라토닌", "카페인", "알코올",
        ],
        _ => &[],
    };
    if !curated.is_empty() {
        return curated.iter().map(|s| s.to_string()).collect();
    }

    [
        "추천", "정보", "팁", "방법", "효과", "후기", "가격", "구매", "리뷰", "비교", "순위", "브랜드",
    ]
    .iter()
    .map(|suffix| format!("{}{}", keyword, suffix))
    .collect()
}

fn sample_table() -> Vec<KeywordTrend> {
    use Competition::*;
    vec![
        KeywordTrend::sample("건강", 95, 1_500_000, 85.5, High, 4.28),
        KeywordTrend::sample("운동", 88, 1_200_000, 78.2, High, 3.91),
        KeywordTrend::sample("다이어트", 82, 980_000, 72.1, Medium, 3.61),
        KeywordTrend::sample("요리", 78, 850_000, 68.5, Medium, 3.43),
        KeywordTrend::sample("여행", 75, 720_000, 65.2, High, 3.26),
        KeywordTrend::sample("게임", 72, 680_000, 62.8, High, 3.14),
        KeywordTrend::sample("영화", 68, 620_000, 59.1, Medium, 2.96),
        KeywordTrend::sample("음악", 65, 580_000, 56.3, Medium, 2.82),
        KeywordTrend::sample("책", 62, 520_000, 53.7, Low, 2.69),
        KeywordTrend::sample("공부", 58, 480_000, 50.2, Medium, 2.51),
        KeywordTrend::sample("취미", 55, 450_000, 47.8, Low, 2.39),
        KeywordTrend::sample("패션", 52, 420_000, 45.1, High, 2.26),
        KeywordTrend::sample("뷰티", 48, 380_000, 42.3, Medium, 2.12),
        KeywordTrend::sample("자동차", 45, 350_000, 39.8, High, 1.99),
        KeywordTrend::sample("부동산", 42, 320_000, 37.2, High, 1.86),
    ]
}

/// Deterministic offline trend data.
///
/// With no keywords the whole table is returned. Otherwise a row matches when
/// either text contains the other or contains one of the keyword's words.
pub fn sample_trends(keywords: &[String]) -> Vec<KeywordTrend> {
    let table = sample_table();
    if keywords.is_empty() {
        return table;
    }

    let mut matched: Vec<KeywordTrend> = Vec::new();
    for keyword in keywords {
        let needle = keyword.trim().to_lowercase();
        for row in &table {
            let text = row.text.to_lowercase();
            let hit = text.contains(&needle)
                || needle.contains(&text)
                || needle.split_whitespace().any(|word| text.contains(word));
            if hit && !matched.contains(row) {
                matched.push(row.clone());
            }
        }
    }

    sort_by_trend(&mut matched);
    matched.truncate(MAX_SAMPLE_RESULTS);
    matched
}

/// Deterministic offline shopping data
pub fn sample_shopping() -> Vec<KeywordTrend> {
    use Competition::*;
    vec![
        KeywordTrend::sample("스마트폰", 90, 1_800_000, 82.5, High, 4.13),
        KeywordTrend::sample("노트북", 85, 1_200_000, 76.8, High, 3.84),
        KeywordTrend::sample("헤드폰", 80, 950_000, 71.2, Medium, 3.56),
        KeywordTrend::sample("스마트워치", 75, 780_000, 66.5, Medium, 3.33),
        KeywordTrend::sample("태블릿", 70, 650_000, 61.8, Medium, 3.09),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sample_trends_without_keywords_is_full_table() {
        let all = sample_trends(&[]);
        assert_eq!(all.len(), 15);
        assert_eq!(all[0].text, "건강");
        assert_eq!(all[0].competition, Competition::High);
    }

    #[test]
    fn test_sample_trends_filters_and_sorts() {
        let trends = sample_trends(&words(&["다이어트", "건강식품", "건강"]));
        let texts: Vec<_> = trends.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["건강", "다이어트"]);
    }

    #[test]
    fn test_sample_trends_matches_words() {
        let trends = sample_trends(&words(&["주말 여행 코스"]));
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].text, "여행");

        assert!(sample_trends(&words(&["quantum"])).is_empty());
    }

    #[test]
    fn test_related_keywords() {
        let related = related_keywords("수면");
        assert_eq!(related.len(), 20);
        assert_eq!(related[0], "불면증");

        let generic = related_keywords("캠핑");
        assert_eq!(generic.len(), 12);
        assert_eq!(generic[0], "캠핑추천");
        assert_eq!(generic[11], "캠핑브랜드");
    }

    #[test]
    fn test_score_results_uses_recent_points() {
        let points = |ratios: &[f64]| {
            ratios
                .iter()
                .enumerate()
                .map(|(i, r)| DataPoint {
                    period: format!("2024-01-{:02}", i + 1),
                    ratio: *r,
                })
                .collect::<Vec<_>>()
        };
        let response = SearchResponse {
            results: vec![
                SearchResult {
                    title: "low".to_string(),
                    data: points(&[100.0, 100.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0]),
                },
                SearchResult {
                    title: "high".to_string(),
                    data: points(&[90.0, 90.0]),
                },
                SearchResult {
                    title: "empty".to_string(),
                    data: Vec::new(),
                },
            ],
        };

        let trends = score_results(response);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].text, "high");
        assert_eq!(trends[0].value, 900);
        assert_eq!(trends[0].search_volume, 900_000);
        assert_eq!(trends[0].competition, Competition::High);
        assert_eq!(trends[0].cpc, 4.5);

        assert_eq!(trends[1].text, "low");
        assert_eq!(trends[1].trend, 10.0);
        assert_eq!(trends[1].competition, Competition::Low);
        assert_eq!(trends[1].data_points.as_ref().map(Vec::len), Some(9));
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(&sample_shopping()[0]).unwrap();
        assert_eq!(value["searchVolume"], 1_800_000);
        assert_eq!(value["competition"], "HIGH");
        assert!(value.get("dataPoints").is_none());
    }

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(Credentials::from_parts(Some("id".into()), None).is_none());
        assert!(Credentials::from_parts(Some("id".into()), Some(String::new())).is_none());
        assert!(Credentials::from_parts(Some("id".into()), Some("secret".into())).is_some());
    }

    #[tokio::test]
    async fn test_without_credentials_serves_samples() {
        let service = TrendService::new(None).unwrap();
        assert!(!service.is_live());
        let trends = service.search_trends(&words(&["운동"]), None, None).await;
        assert_eq!(trends, sample_trends(&words(&["운동"])));
    }

    #[tokio::test]
    async fn test_unreachable_api_falls_back_to_samples() {
        let credentials = Credentials::from_parts(Some("id".into()), Some("secret".into()));
        let service = TrendService::with_base_url(credentials, "http://127.0.0.1:9").unwrap();
        assert!(service.is_live());

        let trends = service.search_trends_with_related("건강", true, 3).await;
        let expected = sample_trends(&words(&["건강", "건강식품", "건강검진", "건강보험"]));
        assert_eq!(trends, expected);
    }
}
