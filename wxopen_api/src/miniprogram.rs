//! Calls made with an authorizer's access token
//!
//! These manage a mini-program on behalf of the authorizer that granted
//! access: testers, server domains, the code commit and audit cycle, code
//! images, and customer service messages.

use wxopen_clock::Clock;
use wxopen_tokens::{AuthorizerAppIdRef, Error};

use crate::{
    dto::{
        AuditStatus, BindTesterResponse, CommitRequest, CustomMessage, DomainAction, EmptyBody,
        MemberAuthRequest, MemberAuthResponse, ModifyDomainRequest, PageListResponse,
        ServerDomains, SubmitAuditResponse, Tester, TesterRequest, WxaCodeRequest,
    },
    EmptyResponse, OpenPlatformClient,
};

impl<C: Clock + Send + Sync> OpenPlatformClient<C> {
    /// Allows a WeChat user to preview the mini-program's development build
    ///
    /// Returns the tester's opaque identifier.
    #[tracing::instrument(err, skip(self, wechat_id), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn bind_tester(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        wechat_id: &str,
    ) -> Result<String, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/bind_tester", &token);
        let response: BindTesterResponse = self
            .post_json(&url, &TesterRequest { wechatid: wechat_id })
            .await?;
        Ok(response.userstr)
    }

    /// Revokes a tester
    #[tracing::instrument(err, skip(self, wechat_id), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn unbind_tester(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        wechat_id: &str,
    ) -> Result<(), Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/unbind_tester", &token);
        let _: EmptyResponse = self
            .post_json(&url, &TesterRequest { wechatid: wechat_id })
            .await?;
        Ok(())
    }

    /// Lists the mini-program's testers
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn testers(&self, authorizer_app_id: &AuthorizerAppIdRef) -> Result<Vec<Tester>, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/memberauth", &token);
        let response: MemberAuthResponse = self
            .post_json(
                &url,
                &MemberAuthRequest {
                    action: "get_experiencer",
                },
            )
            .await?;
        Ok(response.members)
    }

    /// Changes or reads the server domains the mini-program may contact
    ///
    /// Returns the configuration in effect afterwards.
    #[tracing::instrument(err, skip(self, domains), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn modify_domain(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        action: DomainAction,
        domains: &ServerDomains,
    ) -> Result<ServerDomains, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/modify_domain", &token);
        self.post_json(&url, &ModifyDomainRequest { action, domains })
            .await
    }

    /// Uploads code built from a template
    #[tracing::instrument(
        err,
        skip(self, request),
        fields(authorizer_app_id = %authorizer_app_id, template_id = request.template_id)
    )]
    pub async fn commit(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        request: &CommitRequest,
    ) -> Result<(), Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/commit", &token);
        let _: EmptyResponse = self.post_json(&url, request).await?;
        Ok(())
    }

    /// Lists the pages of the committed code
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn page_list(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<Vec<String>, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/get_page", &token);
        let response: PageListResponse = self.get_json(&url).await?;
        Ok(response.page_list)
    }

    /// Submits the committed code for audit
    ///
    /// `request` carries the audit items and any feedback for the auditor,
    /// in the platform's layout. Returns the audit id.
    #[tracing::instrument(err, skip(self, request), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn submit_audit(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        request: &serde_json::Value,
    ) -> Result<i64, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/submit_audit", &token);
        let response: SubmitAuditResponse = self.post_json(&url, request).await?;
        tracing::info!(audit_id = response.auditid, "submitted code for audit");
        Ok(response.auditid)
    }

    /// Withdraws the audit in progress
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn undo_code_audit(&self, authorizer_app_id: &AuthorizerAppIdRef) -> Result<(), Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/undocodeaudit", &token);
        let _: EmptyResponse = self.get_json(&url).await?;
        Ok(())
    }

    /// Gets the state of the most recent audit
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn latest_audit_status(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<AuditStatus, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self
            .endpoints()
            .authorizer_call("/wxa/get_latest_auditstatus", &token);
        self.get_json(&url).await
    }

    /// Publishes the audited code
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn release(&self, authorizer_app_id: &AuthorizerAppIdRef) -> Result<(), Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/release", &token);
        let _: EmptyResponse = self.post_json(&url, &EmptyBody {}).await?;
        tracing::info!("released audited code");
        Ok(())
    }

    /// Renders a mini-program code image that opens a page
    #[tracing::instrument(err, skip(self, request), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn wxa_code(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        request: &WxaCodeRequest,
    ) -> Result<Vec<u8>, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self.endpoints().authorizer_call("/wxa/getwxacode", &token);
        self.post_binary(&url, request).await
    }

    /// Renders the QR code that opens the development build
    ///
    /// `path` selects the page opened, defaulting to the home page.
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn experience_qrcode(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        path: Option<&str>,
    ) -> Result<Vec<u8>, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = match path {
            Some(path) => self.endpoints().authorizer_call_with_query(
                "/wxa/get_qrcode",
                &token,
                &[("path", path)],
            ),
            None => self.endpoints().authorizer_call("/wxa/get_qrcode", &token),
        };
        self.get_binary(&url).await
    }

    /// Renders a QR code that opens a page of the released mini-program
    #[tracing::instrument(err, skip(self, request), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn create_wxa_qrcode(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        request: &WxaCodeRequest,
    ) -> Result<Vec<u8>, Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self
            .endpoints()
            .authorizer_call("/cgi-bin/wxaapp/createwxaqrcode", &token);
        self.post_binary(&url, request).await
    }

    /// Sends a customer service message to an end user
    #[tracing::instrument(err, skip(self, message), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn send_custom_message(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        message: &CustomMessage,
    ) -> Result<(), Error> {
        let token = self.authorizer_token(authorizer_app_id).await?;
        let url = self
            .endpoints()
            .authorizer_call("/cgi-bin/message/custom/send", &token);
        let _: EmptyResponse = self.post_json(&url, message).await?;
        Ok(())
    }
}
