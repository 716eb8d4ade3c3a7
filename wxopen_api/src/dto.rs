//! Request and response bodies of the platform API

use std::fmt;

use serde::{Deserialize, Serialize};
use wxopen_clock::DurationSecs;
use wxopen_tokens::{AccessToken, AppIdRef, AuthorizerAppIdRef, RefreshToken};

/// Which kinds of account may grant access on the authorization page
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthType {
    /// Only official accounts
    OfficialAccount,
    /// Only mini-programs
    MiniProgram,
    /// Either kind
    #[default]
    Any,
}

impl AuthType {
    /// The numeric code the login page expects
    pub fn code(self) -> u8 {
        match self {
            Self::OfficialAccount => 1,
            Self::MiniProgram => 2,
            Self::Any => 3,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ComponentAppIdBody<'a> {
    pub component_appid: &'a AppIdRef,
}

#[derive(Serialize)]
pub(crate) struct AuthorizerInfoRequest<'a> {
    pub component_appid: &'a AppIdRef,
    pub authorizer_appid: &'a AuthorizerAppIdRef,
}

/// A pre-authorization code used to open the authorization page
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PreAuthCode {
    /// The code
    pub pre_auth_code: String,
    /// Seconds until the code expires
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
}

/// An authorizer's account details
///
/// The layouts differ between official accounts and mini-programs, so both
/// sections are kept as raw JSON.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthorizerInfo {
    /// Account information, such as nickname and service type
    pub authorizer_info: serde_json::Value,
    /// The functions the authorizer has granted
    #[serde(default)]
    pub authorization_info: Option<serde_json::Value>,
}

/// Registers a mini-program on behalf of a legal entity
#[derive(Clone, Debug, Serialize)]
pub struct FastRegisterRequest {
    /// Registered name of the enterprise
    pub name: String,
    /// Registration code of the enterprise
    pub code: String,
    /// `1` for a unified social credit code, `2` for an organization code,
    /// `3` for a business license number
    pub code_type: u8,
    /// WeChat id of the legal representative
    pub legal_persona_wechat: String,
    /// Name of the legal representative
    pub legal_persona_name: String,
    /// Contact phone number of the component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_phone: Option<String>,
}

/// Looks up the result of a registration task
#[derive(Clone, Debug, Serialize)]
pub struct FastRegisterQuery {
    /// Registered name of the enterprise
    pub name: String,
    /// WeChat id of the legal representative
    pub legal_persona_wechat: String,
    /// Name of the legal representative
    pub legal_persona_name: String,
}

/// A code template in the component's template library
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CodeTemplate {
    /// The template id used when committing code
    pub template_id: i64,
    /// Version string of the template
    #[serde(default)]
    pub user_version: String,
    /// Description of the template
    #[serde(default)]
    pub user_desc: String,
    /// Unix time the template was created
    #[serde(default)]
    pub create_time: i64,
}

#[derive(Deserialize)]
pub(crate) struct TemplateListResponse {
    #[serde(default)]
    pub template_list: Vec<CodeTemplate>,
}

/// The session of an end user logged in to a mini-program
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct MiniProgramSession {
    /// The end user's id within the mini-program
    pub openid: String,
    /// The key used to decrypt data signed by the end user's client
    pub session_key: String,
    /// The end user's id across the authorizer's accounts
    #[serde(default)]
    pub unionid: Option<String>,
}

impl fmt::Debug for MiniProgramSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MiniProgramSession")
            .field("openid", &self.openid)
            .field("session_key", &"***")
            .field("unionid", &self.unionid)
            .finish()
    }
}

#[derive(Deserialize)]
pub(crate) struct WebTokenResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(default)]
    pub openid: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct TesterRequest<'a> {
    pub wechatid: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct BindTesterResponse {
    #[serde(default)]
    pub userstr: String,
}

#[derive(Serialize)]
pub(crate) struct MemberAuthRequest {
    pub action: &'static str,
}

/// A tester of a mini-program
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Tester {
    /// An opaque identifier of the tester
    pub userstr: String,
}

#[derive(Deserialize)]
pub(crate) struct MemberAuthResponse {
    #[serde(default)]
    pub members: Vec<Tester>,
}

/// How a domain modification applies to the current configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainAction {
    /// Adds the listed domains
    Add,
    /// Removes the listed domains
    Delete,
    /// Replaces the configuration with the listed domains
    Set,
    /// Reads the configuration without changing it
    Get,
}

/// The server domains a mini-program may contact
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct ServerDomains {
    /// Domains for `wx.request`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requestdomain: Vec<String>,
    /// Domains for `wx.connectSocket`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wsrequestdomain: Vec<String>,
    /// Domains for `wx.uploadFile`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uploaddomain: Vec<String>,
    /// Domains for `wx.downloadFile`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloaddomain: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct ModifyDomainRequest<'a> {
    pub action: DomainAction,
    #[serde(flatten)]
    pub domains: &'a ServerDomains,
}

/// Uploads code built from a template
#[derive(Clone, Debug, Serialize)]
pub struct CommitRequest {
    /// The template to build from
    pub template_id: i64,
    /// Configuration injected into the template, as a JSON string
    pub ext_json: String,
    /// Version string shown to the authorizer
    pub user_version: String,
    /// Description shown to the authorizer
    pub user_desc: String,
}

#[derive(Deserialize)]
pub(crate) struct PageListResponse {
    #[serde(default)]
    pub page_list: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct SubmitAuditResponse {
    pub auditid: i64,
}

/// The state of the most recent audit
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AuditStatus {
    /// The audit id returned on submission
    pub auditid: i64,
    /// `0` approved, `1` rejected, `2` in progress, `3` withdrawn,
    /// `4` delayed
    pub status: i64,
    /// Why the audit was rejected
    #[serde(default)]
    pub reason: Option<String>,
    /// Media ids of screenshots illustrating a rejection, separated by `|`
    #[serde(default, rename = "ScreenShot")]
    pub screenshot: Option<String>,
}

impl AuditStatus {
    /// Whether the code passed the audit and can be released
    pub fn is_approved(&self) -> bool {
        self.status == 0
    }
}

/// Requests a mini-program code image for a page
#[derive(Clone, Debug, Serialize)]
pub struct WxaCodeRequest {
    /// The page the code opens, with an optional query string
    pub path: String,
    /// Width of the image in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

#[derive(Serialize)]
pub(crate) struct EmptyBody {}

/// A message sent to an end user through customer service
#[derive(Clone, Debug, Serialize)]
pub struct CustomMessage {
    /// The end user's open id
    pub touser: String,
    /// What to send
    #[serde(flatten)]
    pub body: CustomMessageBody,
}

impl CustomMessage {
    /// A text message
    pub fn text(touser: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            touser: touser.into(),
            body: CustomMessageBody::Text {
                text: TextContent {
                    content: content.into(),
                },
            },
        }
    }
}

/// The kinds of customer service message
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum CustomMessageBody {
    /// Plain text
    Text {
        /// The text
        text: TextContent,
    },
    /// An image uploaded as temporary media
    Image {
        /// The image
        image: MediaContent,
    },
}

/// The content of a text message
#[derive(Clone, Debug, Serialize)]
pub struct TextContent {
    /// The text
    pub content: String,
}

/// A reference to uploaded media
#[derive(Clone, Debug, Serialize)]
pub struct MediaContent {
    /// The media id returned by the upload
    pub media_id: String,
}
