pub mod anilist_api_helper;

/// An AniList media entry as listed by the anime screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub id: u64,
    pub site_url: Option<String>,
    pub title_english: Option<String>,
    pub title_native: Option<String>,
    pub title_romaji: Option<String>,
}

impl Media {
    /// `english (native)`, falling back on whichever titles are set.
    pub fn display_title(&self) -> String {
        let main = self
            .title_english
            .as_deref()
            .or(self.title_romaji.as_deref());
        match (main, self.title_native.as_deref()) {
            (Some(main), Some(native)) => format!("{main} ({native})"),
            (Some(title), None) | (None, Some(title)) => title.to_owned(),
            (None, None) => format!("#{}", self.id),
        }
    }
}

mod media_page_api_response {
    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct PageData {
        #[serde(rename = "Page")]
        pub(crate) page: Option<MediaPage>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct MediaPage {
        #[serde(default)]
        pub(crate) media: Vec<Option<MediaNode>>,
        #[serde(rename = "pageInfo")]
        pub(crate) page_info: Option<AnilistPageInfo>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct MediaNode {
        pub(crate) id: u64,
        #[serde(rename = "siteUrl")]
        pub(crate) site_url: Option<String>,
        pub(crate) title: Option<MediaTitle>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct MediaTitle {
        pub(crate) english: Option<String>,
        pub(crate) native: Option<String>,
        pub(crate) romaji: Option<String>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct AnilistPageInfo {
        #[serde(rename = "currentPage")]
        pub(crate) current_page: u32,
        #[serde(rename = "hasNextPage")]
        pub(crate) has_next_page: bool,
        pub(crate) total: Option<u64>,
    }
}
