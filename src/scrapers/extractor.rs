use crate::error::ExtractError;
use crate::models::{normalize_text, ListingRecord};
use crate::scrapers::fsbo::fsbo_score;
use crate::scrapers::types::SearchParams;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

/// Rows treated as listing cards
const CARD_SELECTOR: &str = "tr[data-id], tr.searchResultsItem";

/// Compiled selectors for one result row
struct CardSelectors {
    card: Selector,
    title_link: Selector,
    title_text: Selector,
    price: Selector,
    location: Selector,
    attribute: Selector,
    date: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            card: selector(CARD_SELECTOR)?,
            title_link: selector("a[title]")?,
            title_text: selector(".classifiedTitle")?,
            price: selector(".searchResultsPriceValue")?,
            location: selector(".searchResultsLocationValue")?,
            attribute: selector(".searchResultsAttributeValue")?,
            date: selector(".searchResultsDateValue")?,
            image: selector("img")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError {
        css: css.to_string(),
        reason: e.to_string(),
    })
}

/// Records recovered from one index page.
/// Consumed by value; re-reading a page means re-fetching it.
#[derive(Debug, Default)]
pub struct ExtractedPage {
    pub records: Vec<ListingRecord>,
    /// Cards dropped for lack of a usable external id
    pub anomalies: u32,
    pub cards_seen: u32,
}

impl IntoIterator for ExtractedPage {
    type Item = ListingRecord;
    type IntoIter = std::vec::IntoIter<ListingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Parses result-list HTML into candidate listings
pub struct ListingExtractor {
    selectors: CardSelectors,
    params: SearchParams,
}

impl ListingExtractor {
    pub fn new(params: SearchParams) -> Result<Self, ExtractError> {
        Ok(Self {
            selectors: CardSelectors::new()?,
            params,
        })
    }

    /// Best-effort extraction; a broken card never affects its siblings
    pub fn extract(&self, html: &str) -> ExtractedPage {
        let document = Html::parse_document(html);
        let mut page = ExtractedPage::default();

        for card in document.select(&self.selectors.card) {
            page.cards_seen += 1;
            match self.extract_card(card) {
                Some(record) => page.records.push(record),
                None => {
                    page.anomalies += 1;
                    debug!("Dropped card {} without external id", page.cards_seen);
                }
            }
        }

        info!(
            "📊 Found {} cards, {} listings, {} anomalies",
            page.cards_seen,
            page.records.len(),
            page.anomalies
        );
        page
    }

    fn extract_card(&self, card: ElementRef<'_>) -> Option<ListingRecord> {
        let s = &self.selectors;
        let title_link = card.select(&s.title_link).next();
        let href = title_link
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty());

        let external_id = card
            .value()
            .attr("data-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| href.and_then(id_from_href))?;

        let mut record = ListingRecord::candidate(external_id);

        record.title = title_link
            .and_then(|a| a.value().attr("title"))
            .and_then(non_empty)
            .or_else(|| first_text(card, &s.title_text));
        record.url = href.map(|h| self.params.absolutize(h));

        record.price_text = first_text(card, &s.price);
        record.price = record.price_text.as_deref().and_then(parse_price);

        record.location_text = first_text(card, &s.location);

        let attributes: Vec<String> = card
            .select(&s.attribute)
            .map(element_text)
            .collect();
        if attributes.len() >= 3 {
            record.rooms = non_empty(&attributes[0]);
            record.area_sqm = first_number(&attributes[1]);
            record.building_age = first_number(&attributes[2]);
        }

        record.posted_text = first_text(card, &s.date);
        record.posted_at = record.posted_text.as_deref().and_then(parse_posted_date);

        record.image_urls = card
            .select(&s.image)
            .filter_map(|img| {
                img.value()
                    .attr("data-src")
                    .or_else(|| img.value().attr("src"))
            })
            .map(str::trim)
            .filter(|src| !src.is_empty() && !src.starts_with("data:"))
            .map(|src| self.params.absolutize(src))
            .collect();

        record.fsbo_score = fsbo_score(&record);
        Some(record.with_hash())
    }
}

/// Whether `html` holds at least one row the extractor would read as a card
pub fn has_result_rows(html: &str) -> bool {
    selector(CARD_SELECTOR)
        .map(|card| Html::parse_document(html).select(&card).next().is_some())
        .unwrap_or(false)
}

fn first_text(card: ElementRef<'_>, sel: &Selector) -> Option<String> {
    card.select(sel)
        .next()
        .and_then(|el| non_empty(&element_text(el)))
}

/// Text nodes joined by spaces so `<br>`-separated parts stay apart
fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn non_empty(value: &str) -> Option<String> {
    let normalized = normalize_text(value);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Trailing numeric id of a detail link such as `/ilan/emlak-konut-...-1123456789/detay`
fn id_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let segment = path
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != "detay")
        .last()?;
    let tail = segment.rsplit('-').next()?;
    if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
        Some(tail.to_string())
    } else {
        None
    }
}

/// `1.250.000 TL` -> 1250000. Thousands separators and currency are dropped.
pub fn parse_price(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn first_number(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

const TURKISH_MONTHS: [&str; 12] = [
    "ocak", "şubat", "mart", "nisan", "mayıs", "haziran", "temmuz", "ağustos", "eylül", "ekim",
    "kasım", "aralık",
];

/// Accepts `18 Ekim 2026` and `2026-10-18`
pub fn parse_posted_date(text: &str) -> Option<NaiveDate> {
    let normalized = normalize_text(text);
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Some(date);
    }

    let lowered = normalized.to_lowercase();
    let mut parts = lowered.split(' ');
    let day: u32 = parts.next()?.parse().ok()?;
    let month_name = parts.next()?;
    let year: i32 = parts.next()?.parse().ok()?;
    let month = TURKISH_MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// One result row in the site's markup
    pub fn card(id: Option<&str>, title: &str, price: &str, location: &str) -> String {
        let id_attr = id.map(|i| format!(r#" data-id="{}""#, i)).unwrap_or_default();
        format!(
            r#"<tr class="searchResultsItem"{id_attr}>
  <td class="searchResultsLargeThumbnail"><a href="/ilan/x"><img src="https://image5.example.test/photos/{title_len}/thmb.jpg" alt=""></a></td>
  <td class="searchResultsTitleValue"><a class="classifiedTitle" title="{title}" href="/ilan/emlak-konut-satilik-{slug}/detay">{title}</a></td>
  <td class="searchResultsAttributeValue">3+1</td>
  <td class="searchResultsAttributeValue">135</td>
  <td class="searchResultsAttributeValue">12</td>
  <td class="searchResultsPriceValue"><div>{price}</div></td>
  <td class="searchResultsDateValue"><span>18 Ekim</span><br><span>2026</span></td>
  <td class="searchResultsLocationValue">{location}</td>
</tr>"#,
            id_attr = id_attr,
            title = title,
            title_len = title.len(),
            slug = id.unwrap_or("nolink"),
            price = price,
            location = location,
        )
    }

    pub fn page(cards: &[String]) -> String {
        format!(
            "<html><body><table id=\"searchResultsTable\"><tbody>{}</tbody></table></body></html>",
            cards.concat()
        )
    }
}
