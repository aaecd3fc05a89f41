//! Prompt templates. `{placeholders}` are filled with `str::replace`.

pub const SUMMARY_SYSTEM: &str = "You are a professional content summarization assistant, \
skilled at distilling long text content into concise and clear summaries.";

pub const ONE_LINE_SYSTEM: &str = "You are a professional content summarization assistant, \
skilled at creating concise one-line summaries.";

pub const KEY_POINTS_SYSTEM: &str = "You are a professional content analysis assistant, \
skilled at extracting key points from text content.";

pub const CHAT_SYSTEM: &str = "You are an intelligent assistant that answers user questions \
based on the provided summary content. If the question goes beyond the content scope, \
please politely explain.";

pub const WEB_SUMMARY_PROMPT: &str = "\
Please generate a comprehensive English summary for the following web content with these requirements:
1. Keep the summary between 200-300 words
2. Highlight the main content points
3. Use clear and structured language
4. Maintain an objective and neutral tone

Web Title: {title}
Web URL: {url}
Web Content: {body}";

pub const WEB_ONE_LINE_PROMPT: &str = "\
Please generate a single sentence summary (maximum 20 words) for the following web content:

Web Title: {title}
Web URL: {url}
Web Content: {body}";

pub const WEB_KEY_POINTS_PROMPT: &str = "\
Please extract 3-5 key points from the following web content. Each key point should be a \
concise sentence (maximum 15 words). Return them as a numbered list:

Web Title: {title}
Web URL: {url}
Web Content: {body}";

pub const VIDEO_SUMMARY_PROMPT: &str = "\
Please generate a comprehensive English summary for the following video transcript with these requirements:
1. Keep the summary between 200-300 words
2. Highlight the main points and key content
3. Use clear and structured language
4. Maintain an objective and neutral tone

Video Title: {title}
Video URL: {url}
Video Transcript: {body}";

pub const VIDEO_ONE_LINE_PROMPT: &str = "\
Please generate a single sentence summary (maximum 20 words) for the following video:

Video Title: {title}
Video URL: {url}
Video Transcript: {body}";

pub const VIDEO_KEY_POINTS_PROMPT: &str = "\
Please extract 3-5 key points from the following video transcript. Each key point should be \
a concise sentence (maximum 15 words). Return them as a numbered list:

Video Title: {title}
Video URL: {url}
Video Transcript: {body}";

pub const LANGUAGE_SUMMARY_PROMPT: &str = "\
{instruction} generate a comprehensive {language} summary for the following content with these requirements:
1. Keep the summary between 200-300 words
2. Highlight the main content points
3. Use clear and structured language
4. Maintain an objective and neutral tone

Content: {body}";

pub const LANGUAGE_ONE_LINE_PROMPT: &str = "\
{instruction} generate a single sentence summary (maximum 20 words) for the following content:

Content: {body}";

pub const LANGUAGE_KEY_POINTS_PROMPT: &str = "\
{instruction} extract 3-5 key points from the following content. Each key point should be a \
concise sentence (maximum 15 words). Return them as a numbered list:

Content: {body}";

pub const NOTE_SUMMARY_PROMPT: &str = "\
Please analyze the following note content and provide:

1. A comprehensive summary (2-3 paragraphs)
2. A one-line summary (1 sentence)
3. Key points (3-5 bullet points)

Note content:
{body}

Please respond in JSON format:
{
  \"summary\": \"comprehensive summary here\",
  \"oneLineSummary\": \"one line summary here\",
  \"keyPoints\": [\"key point 1\", \"key point 2\", \"key point 3\"]
}";

pub const ANSWER_PROMPT: &str = "\
Based on the following summary content, answer the user's question. If the question goes \
beyond the scope of the summary content, please politely explain.

Summary Content: {context}
User Question: {question}";
