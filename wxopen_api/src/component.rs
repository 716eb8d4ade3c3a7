//! Calls made with the component token

use wxopen_clock::Clock;
use wxopen_tokens::{endpoint::Url, AuthorizerAppIdRef, Error};

use crate::{
    dto::{
        AuthType, AuthorizerInfo, AuthorizerInfoRequest, CodeTemplate, ComponentAppIdBody,
        FastRegisterQuery, FastRegisterRequest, MiniProgramSession, PreAuthCode,
        TemplateListResponse,
    },
    EmptyResponse, OpenPlatformClient,
};

impl<C: Clock + Send + Sync> OpenPlatformClient<C> {
    /// Creates a pre-authorization code
    #[tracing::instrument(err, skip(self))]
    pub async fn create_pre_auth_code(&self) -> Result<PreAuthCode, Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().create_pre_auth_code(&token);
        self.post_json(
            &url,
            &ComponentAppIdBody {
                component_appid: self.component().app_id(),
            },
        )
        .await
    }

    /// Builds the page an authorizer's administrator visits to grant access
    ///
    /// A fresh pre-authorization code is created for every page.
    #[tracing::instrument(err, skip(self))]
    pub async fn authorization_url(
        &self,
        redirect_uri: &str,
        auth_type: AuthType,
    ) -> Result<Url, Error> {
        let code = self.create_pre_auth_code().await?;
        Ok(self.endpoints().component_login_page(
            self.component().app_id(),
            &code.pre_auth_code,
            redirect_uri,
            auth_type.code(),
        ))
    }

    /// Gets an authorizer's account details
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn authorizer_info(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<AuthorizerInfo, Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().authorizer_info(&token);
        self.post_json(
            &url,
            &AuthorizerInfoRequest {
                component_appid: self.component().app_id(),
                authorizer_appid: authorizer_app_id,
            },
        )
        .await
    }

    /// Starts registration of a mini-program for a legal entity
    ///
    /// The outcome arrives later as a push notification.
    #[tracing::instrument(err, skip(self, request), fields(name = %request.name))]
    pub async fn fast_register_weapp(&self, request: &FastRegisterRequest) -> Result<(), Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().fast_register_weapp(&token, "create");
        let _: EmptyResponse = self.post_json(&url, request).await?;
        Ok(())
    }

    /// Checks on a registration task
    ///
    /// Succeeds once the task exists; failures surface as
    /// [`Error::RemoteApi`] carrying the platform's reason.
    #[tracing::instrument(err, skip(self, query), fields(name = %query.name))]
    pub async fn fast_register_weapp_search(&self, query: &FastRegisterQuery) -> Result<(), Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().fast_register_weapp(&token, "search");
        let _: EmptyResponse = self.post_json(&url, query).await?;
        Ok(())
    }

    /// Lists the code templates in the component's library
    #[tracing::instrument(err, skip(self))]
    pub async fn template_list(&self) -> Result<Vec<CodeTemplate>, Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().template_list(&token);
        let response: TemplateListResponse = self.get_json(&url).await?;
        Ok(response.template_list)
    }

    /// Exchanges a mini-program login code for the end user's session
    #[tracing::instrument(err, skip(self, js_code), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn jscode2session(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        js_code: &str,
    ) -> Result<MiniProgramSession, Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().jscode2session(
            authorizer_app_id,
            js_code,
            self.component().app_id(),
            &token,
        );
        self.get_json(&url).await
    }
}
