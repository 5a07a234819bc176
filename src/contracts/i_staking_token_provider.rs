use ethers::prelude::abigen;

abigen!(
    IStakingTokenProvider,
    r#"[
        function stakingTokenForVaultToken(address vaultToken) external view returns (address)
    ]"#
);
