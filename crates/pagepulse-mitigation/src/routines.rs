//! 지표별 DOM 완화 루틴.
//!
//! 각 루틴은 변경한 항목 수를 반환한다. 일치하는 요소가 없으면 0이며 DOM은 그대로다.
//! 같은 DOM에 두 번 실행해도 두 번째는 아무것도 바꾸지 않는다.

use pagepulse_core::config::MitigationConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::ports::dom::{DomAccessor, ElementHandle};

/// 지연 처리한 스타일시트 표시 속성
pub const DEFERRED_MARKER: &str = "data-pagepulse-deferred";

/// 조회한 핸들로 작업 후 반드시 반납
fn with_elements<T>(
    dom: &dyn DomAccessor,
    selector: &str,
    f: impl FnOnce(&[ElementHandle]) -> Result<T, CoreError>,
) -> Result<T, CoreError> {
    let handles = dom.query_all(selector)?;
    let result = f(&handles);
    dom.release(&handles);
    result
}

// ============================================================
// LCP
// ============================================================

/// 아직 요청되지 않은 핵심 리소스 프리로드
pub fn preload_critical_assets(
    dom: &dyn DomAccessor,
    config: &MitigationConfig,
) -> Result<usize, CoreError> {
    let mut added = 0;
    for asset in &config.critical_assets {
        let selector = format!(r#"link[href="{}"]"#, asset.href);
        let already = with_elements(dom, &selector, |found| Ok(!found.is_empty()))?;
        if !already {
            dom.append_preload(asset)?;
            added += 1;
        }
    }
    Ok(added)
}

/// 화면 상단의 가장 큰 이미지를 즉시 로드 + 크기 명시
pub fn prioritize_largest_image(dom: &dyn DomAccessor) -> Result<usize, CoreError> {
    let viewport = dom.viewport_height();
    with_elements(dom, "img", |images| {
        let mut largest: Option<(ElementHandle, f64)> = None;
        for &img in images {
            let Some(rect) = dom.bounding_rect(img) else {
                continue;
            };
            let area = rect.area();
            if rect.top < viewport && area > largest.map_or(0.0, |(_, a)| a) {
                largest = Some((img, area));
            }
        }

        let Some((img, _)) = largest else {
            return Ok(0);
        };

        let mut changed = 0;
        if !dom.has_attribute(img, "loading") {
            dom.set_attribute(img, "loading", "eager")?;
            changed += 1;
        }
        if !dom.has_attribute(img, "width") || !dom.has_attribute(img, "height") {
            if let Some((width, height)) = dom.natural_size(img).filter(|(w, h)| *w > 0 && *h > 0)
            {
                dom.set_attribute(img, "width", &width.to_string())?;
                dom.set_attribute(img, "height", &height.to_string())?;
                changed += 1;
            }
        }
        Ok(changed)
    })
}

/// 핵심이 아닌 스타일시트를 `media=print`로 지연, 로드 후 `all`로 복원
pub fn defer_non_critical_css(
    dom: &dyn DomAccessor,
    config: &MitigationConfig,
) -> Result<usize, CoreError> {
    let selector = format!(r#"link[rel="stylesheet"]:not([{DEFERRED_MARKER}])"#);
    with_elements(dom, &selector, |links| {
        let mut deferred = 0;
        for &link in links {
            let href = dom.attribute(link, "href").unwrap_or_default();
            if href.contains(config.critical_marker.as_str()) {
                continue;
            }
            dom.set_attribute(link, "media", "print")?;
            dom.on_load_set_attribute(link, "media", "all")?;
            dom.set_attribute(link, DEFERRED_MARKER, "")?;
            deferred += 1;
        }
        Ok(deferred)
    })
}

// ============================================================
// FID
// ============================================================

/// 필수가 아닌 외부 스크립트에 `defer` 지정
pub fn defer_non_critical_scripts(dom: &dyn DomAccessor) -> Result<usize, CoreError> {
    with_elements(
        dom,
        "script[src]:not([defer]):not([async]):not([data-critical])",
        |scripts| {
            for &script in scripts {
                dom.set_attribute(script, "defer", "")?;
            }
            Ok(scripts.len())
        },
    )
}

// ============================================================
// CLS
// ============================================================

/// 크기 속성이 없는 이미지에 원본 크기 지정
pub fn ensure_image_dimensions(dom: &dyn DomAccessor) -> Result<usize, CoreError> {
    with_elements(dom, "img:not([width]):not([height])", |images| {
        let mut changed = 0;
        for &img in images {
            if let Some((width, height)) = dom.natural_size(img).filter(|(w, h)| *w > 0 && *h > 0)
            {
                dom.set_attribute(img, "width", &width.to_string())?;
                dom.set_attribute(img, "height", &height.to_string())?;
                changed += 1;
            }
        }
        Ok(changed)
    })
}

/// 동적 콘텐츠 컨테이너에 최소 높이 확보
pub fn reserve_dynamic_space(
    dom: &dyn DomAccessor,
    config: &MitigationConfig,
) -> Result<usize, CoreError> {
    with_elements(dom, &config.dynamic_selector, |elements| {
        let mut changed = 0;
        for &element in elements {
            if dom.style(element, "min-height").is_none() {
                dom.set_style(element, "min-height", &config.dynamic_min_height)?;
                changed += 1;
            }
        }
        Ok(changed)
    })
}

/// 콘텐츠 컨테이너에 `position: relative` 적용
pub fn anchor_content_containers(
    dom: &dyn DomAccessor,
    config: &MitigationConfig,
) -> Result<usize, CoreError> {
    with_elements(dom, &config.content_container_selector, |containers| {
        let mut changed = 0;
        for &container in containers {
            if dom.style(container, "position").as_deref() != Some("relative") {
                dom.set_style(container, "position", "relative")?;
                changed += 1;
            }
        }
        Ok(changed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_dom::{MemoryDom, MemoryElement};
    use pagepulse_core::config::PreloadAsset;
    use pagepulse_core::ports::dom::Rect;

    fn hero_asset() -> PreloadAsset {
        PreloadAsset {
            href: "/images/hero.webp".into(),
            as_type: "image".into(),
            mime_type: Some("image/webp".into()),
            cross_origin: None,
        }
    }

    #[test]
    fn preload_skips_already_linked_assets() {
        let dom = MemoryDom::new(800.0);
        let mut config = MitigationConfig::default();
        config.critical_assets = vec![hero_asset()];

        assert_eq!(preload_critical_assets(&dom, &config).unwrap(), 1);
        assert_eq!(preload_critical_assets(&dom, &config).unwrap(), 0);

        let links = dom.query_all(r#"link[rel="preload"]"#).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(dom.attribute(links[0], "type").as_deref(), Some("image/webp"));
    }

    #[test]
    fn default_config_preloads_font_and_hero_image() {
        let dom = MemoryDom::new(800.0);
        let config = MitigationConfig::default();

        assert_eq!(preload_critical_assets(&dom, &config).unwrap(), 2);

        let links = dom.query_all(r#"link[rel="preload"]"#).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(
            dom.attribute(links[0], "href").as_deref(),
            Some("/fonts/inter-v12-latin-regular.woff2")
        );
        assert_eq!(dom.attribute(links[0], "as").as_deref(), Some("font"));
        assert_eq!(dom.attribute(links[0], "type").as_deref(), Some("font/woff2"));
        assert_eq!(
            dom.attribute(links[0], "crossorigin").as_deref(),
            Some("anonymous")
        );
        assert_eq!(dom.attribute(links[1], "href").as_deref(), Some("/images/hero.webp"));
        assert_eq!(dom.attribute(links[1], "as").as_deref(), Some("image"));
        assert!(dom.attribute(links[1], "crossorigin").is_none());
    }

    #[test]
    fn largest_image_above_fold_wins() {
        let dom = MemoryDom::new(800.0);
        let small = dom.insert(
            MemoryElement::new("img").rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
        );
        let hero = dom.insert(
            MemoryElement::new("img")
                .rect(Rect::new(100.0, 0.0, 1200.0, 600.0))
                .natural_size(2400, 1200),
        );
        let below = dom.insert(
            MemoryElement::new("img").rect(Rect::new(900.0, 0.0, 2000.0, 2000.0)),
        );

        assert_eq!(prioritize_largest_image(&dom).unwrap(), 2);
        assert_eq!(dom.attribute(hero, "loading").as_deref(), Some("eager"));
        assert_eq!(dom.attribute(hero, "width").as_deref(), Some("2400"));
        assert_eq!(dom.attribute(hero, "height").as_deref(), Some("1200"));
        assert!(dom.attribute(small, "loading").is_none());
        assert!(dom.attribute(below, "loading").is_none());

        assert_eq!(prioritize_largest_image(&dom).unwrap(), 0);
    }

    #[test]
    fn critical_stylesheets_are_kept() {
        let dom = MemoryDom::new(800.0);
        let critical = dom.insert(
            MemoryElement::new("link")
                .attr("rel", "stylesheet")
                .attr("href", "/css/critical.css"),
        );
        let theme = dom.insert(
            MemoryElement::new("link")
                .attr("rel", "stylesheet")
                .attr("href", "/css/theme.css"),
        );
        let config = MitigationConfig::default();

        assert_eq!(defer_non_critical_css(&dom, &config).unwrap(), 1);
        assert!(dom.attribute(critical, "media").is_none());
        assert_eq!(dom.attribute(theme, "media").as_deref(), Some("print"));

        dom.fire_load(theme);
        assert_eq!(dom.attribute(theme, "media").as_deref(), Some("all"));
        // 재실행 시 다시 print로 돌리지 않음
        assert_eq!(defer_non_critical_css(&dom, &config).unwrap(), 0);
        assert_eq!(dom.attribute(theme, "media").as_deref(), Some("all"));
    }

    #[test]
    fn already_loaded_stylesheet_is_not_left_as_print() {
        let dom = MemoryDom::new(800.0);
        let cached = dom.insert(
            MemoryElement::new("link")
                .attr("rel", "stylesheet")
                .attr("href", "/css/theme.css")
                .loaded(),
        );

        assert_eq!(defer_non_critical_css(&dom, &MitigationConfig::default()).unwrap(), 1);
        assert_eq!(dom.attribute(cached, "media").as_deref(), Some("all"));
    }

    #[test]
    fn only_plain_scripts_are_deferred() {
        let dom = MemoryDom::new(800.0);
        let plain = dom.insert(MemoryElement::new("script").attr("src", "/chat.js"));
        let critical = dom.insert(
            MemoryElement::new("script")
                .attr("src", "/app.js")
                .attr("data-critical", ""),
        );
        dom.insert(MemoryElement::new("script").attr("src", "/a.js").attr("async", ""));
        dom.insert(MemoryElement::new("script"));

        assert_eq!(defer_non_critical_scripts(&dom).unwrap(), 1);
        assert!(dom.has_attribute(plain, "defer"));
        assert!(!dom.has_attribute(critical, "defer"));
    }

    #[test]
    fn cls_routines() {
        let dom = MemoryDom::new(800.0);
        let known = dom.insert(MemoryElement::new("img").natural_size(640, 480));
        let unknown = dom.insert(MemoryElement::new("img"));
        let lazy = dom.insert(MemoryElement::new("div").attr("data-lazy", ""));
        let sized = dom.insert(
            MemoryElement::new("div")
                .attr("data-dynamic", "")
                .style("min-height", "50px"),
        );
        let container = dom.insert(MemoryElement::new("section").attr("class", "content-container"));
        let config = MitigationConfig::default();

        assert_eq!(ensure_image_dimensions(&dom).unwrap(), 1);
        assert_eq!(dom.attribute(known, "width").as_deref(), Some("640"));
        assert!(dom.attribute(unknown, "width").is_none());

        assert_eq!(reserve_dynamic_space(&dom, &config).unwrap(), 1);
        assert_eq!(dom.style(lazy, "min-height").as_deref(), Some("200px"));
        assert_eq!(dom.style(sized, "min-height").as_deref(), Some("50px"));

        assert_eq!(anchor_content_containers(&dom, &config).unwrap(), 1);
        assert_eq!(dom.style(container, "position").as_deref(), Some("relative"));
        assert_eq!(anchor_content_containers(&dom, &config).unwrap(), 0);
    }

    #[test]
    fn handles_are_released() {
        let dom = MemoryDom::new(800.0);
        dom.insert(MemoryElement::new("img").natural_size(10, 10));
        dom.insert(MemoryElement::new("img"));

        ensure_image_dimensions(&dom).unwrap();
        assert_eq!(dom.released_handles(), 2);
    }
}
