//! Ticker to Russian company name mapping

/// Known MOEX tickers with their Russian company names
pub const RUSSIAN_COMPANIES: &[(&str, &str)] = &[
    ("SBER", "Сбербанк"),
    ("GAZP", "Газпром"),
    ("LKOH", "Лукойл"),
    ("YNDX", "Яндекс"),
    ("ROSN", "Роснефть"),
    ("NVTK", "Новатэк"),
    ("PLZL", "Полюс"),
    ("GMKN", "Норникель"),
    ("MGNT", "Магнит"),
    ("MTSS", "МТС"),
    ("RTKM", "Ростелеком"),
    ("AFLT", "Аэрофлот"),
    ("VTBR", "ВТБ"),
    ("TATN", "Татнефть"),
    ("SNGS", "Сургутнефтегаз"),
    ("NLMK", "НЛМК"),
    ("CHMF", "Северсталь"),
    ("ALRS", "Алроса"),
    ("MOEX", "Московская биржа"),
    ("MAIL", "Mail.ru"),
    ("OZON", "Озон"),
    ("FIXP", "Fix Price"),
];

/// Russian company name for a ticker, falling back to the ticker itself
pub fn company_name(ticker: &str) -> String {
    let upper = ticker.to_uppercase();
    RUSSIAN_COMPANIES
        .iter()
        .find(|(t, _)| *t == upper)
        .map_or(upper, |(_, name)| (*name).to_string())
}

/// Lowercase search keywords under which a company appears in news text
pub fn name_variations(ticker: &str) -> Vec<String> {
    let upper = ticker.to_uppercase();
    let mut terms = vec![upper.to_lowercase()];

    let extra: &[&str] = match upper.as_str() {
        "SBER" => &["сбербанк", "сбер"],
        "GAZP" => &["газпром"],
        "LKOH" => &["лукойл"],
        "YNDX" => &["яндекс"],
        "ROSN" => &["роснефть"],
        "NVTK" => &["новатэк"],
        "PLZL" => &["полюс"],
        "GMKN" => &["норникель"],
        "MGNT" => &["магнит"],
        "MTSS" => &["мтс"],
        "RTKM" => &["ростелеком"],
        "AFLT" => &["аэрофлот"],
        "VTBR" => &["втб"],
        "TATN" => &["татнефть"],
        "SNGS" => &["сургутнефтегаз"],
        "NLMK" => &["нлмк"],
        "CHMF" => &["северсталь"],
        "ALRS" => &["алроса"],
        "MOEX" => &["московская биржа", "мосбиржа"],
        "MAIL" => &["mail.ru"],
        "OZON" => &["озон"],
        "FIXP" => &["fix price"],
        _ => &[],
    };

    terms.extend(extra.iter().map(|s| (*s).to_string()));
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ticker() {
        assert_eq!(company_name("sber"), "Сбербанк");
        assert_eq!(company_name("GAZP"), "Газпром");
    }

    #[test]
    fn test_unknown_ticker_falls_back() {
        assert_eq!(company_name("abcd"), "ABCD");
    }

    #[test]
    fn test_variations_include_ticker() {
        let terms = name_variations("SBER");
        assert!(terms.contains(&"sber".to_string()));
        assert!(terms.contains(&"сбер".to_string()));
    }
}
