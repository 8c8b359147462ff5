use askama::Template;
use docqa_core::Session;

pub const PAGE_TITLE: &str = "📝 Multi-File Q&A with OpenAI";

pub struct MessageView<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage<'a> {
    pub title: &'a str,
    pub notice: Option<&'a str>,
    pub indexed_chunks: Option<usize>,
    pub messages: Vec<MessageView<'a>>,
}

impl<'a> IndexPage<'a> {
    pub fn from_session(session: &'a Session) -> Self {
        Self {
            title: PAGE_TITLE,
            notice: session.notice(),
            indexed_chunks: session.index().map(|index| index.len()),
            messages: session
                .transcript()
                .iter()
                .map(|message| MessageView {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
        }
    }
}
